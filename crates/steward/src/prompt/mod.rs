//! System prompt assembly.
//!
//! - [`builder`]: [`SystemPromptBuilder`], the ordered-section builder.
//! - [`sources`]: the [`SnapshotSource`] seam for world model, watchers, and
//!   captures.
//! - [`composer`]: [`PromptComposer`], which fixes the section order and seals
//!   every prompt with the safety block.

pub mod builder;
pub mod composer;
pub mod sources;

pub use builder::SystemPromptBuilder;
pub use composer::{DEFAULT_PERSONA, PERSONA_FILE, PromptComposer};
pub use sources::{NO_ACTIVE_CAPTURES, NO_ACTIVE_WATCHERS, SnapshotSource, StaticSnapshot};
