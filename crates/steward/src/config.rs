//! Configuration surface, loaded from YAML.
//!
//! Every section carries `#[serde(default)]`, so a partial file (or no file at
//! all) yields the documented defaults:
//!
//! ```yaml
//! safety:
//!   max_agent_turns: 20
//!   protected_nodes: [steward-agent]
//!   allowed_data_paths: [/data/, /tmp/steward/]
//! watchers:
//!   max_actions_per_hour: 30
//! memory:
//!   max_size_chars: 5000
//!   max_entries_per_category: 20
//! agent:
//!   history_window: 20
//! reflection:
//!   enabled: true
//!   max_rounds: 3
//! ```
//!
//! The safety values are read once, through
//! [`SafetyParams::capture`](crate::safety::SafetyParams::capture). Editing the
//! file afterwards has no effect on a running process.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StewardConfig {
    pub safety: SafetyConfig,
    pub watchers: WatcherConfig,
    pub memory: MemoryConfig,
    pub agent: AgentConfig,
    pub reflection: ReflectionConfig,
}

impl StewardConfig {
    /// Load configuration from a YAML file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| format!("Failed to parse config: {e}"))
    }
}

/// `safety.*` options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Maximum reasoning turns per user message. Default: `20`.
    pub max_agent_turns: u32,
    /// Nodes that may never be stopped, removed, or uninstalled.
    pub protected_nodes: Vec<String>,
    /// Path prefixes data may be written under.
    pub allowed_data_paths: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_agent_turns: 20,
            protected_nodes: vec!["steward-agent".to_string()],
            allowed_data_paths: vec!["/data/".to_string(), "/tmp/steward/".to_string()],
        }
    }
}

/// `watchers.*` options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Automated actions allowed per watcher per hour. Default: `30`.
    pub max_actions_per_hour: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_actions_per_hour: 30,
        }
    }
}

/// `memory.*` options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Character ceiling for the whole memory document. Default: `5000`.
    pub max_size_chars: usize,
    /// Entry ceiling per category. Default: `20`.
    pub max_entries_per_category: usize,
    /// Additional injection patterns (case-insensitive regexes). These are
    /// added to the built-in list; they cannot remove built-in patterns.
    pub extra_blocked_patterns: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size_chars: 5000,
            max_entries_per_category: 20,
            extra_blocked_patterns: Vec::new(),
        }
    }
}

/// `agent.*` options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Number of most recent transcript messages replayed into the model
    /// context. Default: `20`.
    pub history_window: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { history_window: 20 }
    }
}

/// `reflection.*` options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    /// Whether post-exchange reflection runs at all. Default: `true`.
    pub enabled: bool,
    /// Model↔tool rounds a reflection pass may use. Default: `3`.
    pub max_rounds: u32,
    /// Characters of the answer and of memory shown to the reflection
    /// prompt. Default: `500`.
    pub excerpt_chars: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rounds: 3,
            excerpt_chars: 500,
        }
    }
}
