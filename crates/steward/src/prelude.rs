//! Convenience re-exports for common `steward` types.
//!
//! ```ignore
//! use steward::prelude::*;
//! ```
//!
//! Pulls in what an embedding binary needs to wire an assistant: messages and
//! the model seam, configuration, the capability registry, the memory store,
//! the prompt composer, and the agent with its event handlers. Document-level
//! helpers (`memory::document`) and the transcript store are left out; import
//! them from their modules when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    ChatFuture, Message, MessageRole, ModelProvider, ModelResponse, ToolCall, ToolDef,
    json_schema_for,
};

// ── Configuration and safety ────────────────────────────────────────
pub use crate::config::StewardConfig;
pub use crate::safety::SafetyParams;

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentEvent, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler,
    NoopHandler, ReflectionOutcome,
};

// ── Prompt ──────────────────────────────────────────────────────────
pub use crate::prompt::{PromptComposer, SnapshotSource, StaticSnapshot, SystemPromptBuilder};

// ── Memory ──────────────────────────────────────────────────────────
pub use crate::memory::{MemoryStore, WriteRejection, register_memory_tools};

// ── Capabilities ────────────────────────────────────────────────────
pub use crate::tools::{
    Capability, CapabilityFuture, CapabilityRegistry, FnCapability, parse_tool_args,
};
