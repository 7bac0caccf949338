//! Live-state collaborators read by the prompt composer.
//!
//! The world model, the watcher engine, and the data router all live outside
//! this crate. The composer only needs a text rendering of each, taken fresh
//! on every build.

use std::sync::RwLock;

/// Sentinel rendered by a watcher engine with nothing to report.
pub const NO_ACTIVE_WATCHERS: &str = "No active watchers.";

/// Sentinel rendered by a data router with nothing to report.
pub const NO_ACTIVE_CAPTURES: &str = "No active captures.";

/// A component that can describe its current state as prompt text.
pub trait SnapshotSource: Send + Sync {
    /// Current state as text.
    fn snapshot(&self) -> String;

    /// Text this source renders when it has nothing to report. The composer
    /// omits the section when the snapshot equals it.
    fn empty_sentinel(&self) -> Option<&str> {
        None
    }
}

/// A snapshot holding plain text that can be replaced at runtime.
///
/// ```
/// use steward::prompt::{SnapshotSource, StaticSnapshot, NO_ACTIVE_WATCHERS};
///
/// let watchers = StaticSnapshot::new(NO_ACTIVE_WATCHERS).with_sentinel(NO_ACTIVE_WATCHERS);
/// assert_eq!(watchers.snapshot(), NO_ACTIVE_WATCHERS);
///
/// watchers.set("- door-open: alert when the garage door opens");
/// assert!(watchers.snapshot().starts_with("- door-open"));
/// ```
#[derive(Debug, Default)]
pub struct StaticSnapshot {
    text: RwLock<String>,
    sentinel: Option<String>,
}

impl StaticSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: RwLock::new(text.into()),
            sentinel: None,
        }
    }

    /// An empty source.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = Some(sentinel.into());
        self
    }

    /// Replace the text.
    pub fn set(&self, text: impl Into<String>) {
        *self.text.write().unwrap_or_else(|e| e.into_inner()) = text.into();
    }
}

impl SnapshotSource for StaticSnapshot {
    fn snapshot(&self) -> String {
        self.text.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn empty_sentinel(&self) -> Option<&str> {
        self.sentinel.as_deref()
    }
}

/// The snapshot of `source`, or `None` when it is blank or equals the
/// sentinel (`source`'s own, else `default_sentinel`).
pub fn active_snapshot(source: &dyn SnapshotSource, default_sentinel: &str) -> Option<String> {
    let text = source.snapshot();
    let sentinel = source.empty_sentinel().unwrap_or(default_sentinel);
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == sentinel.trim() {
        None
    } else {
        Some(text)
    }
}
