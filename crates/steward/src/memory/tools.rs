//! Capabilities that let the model read and write its own memory.

use super::{DEFAULT_CATEGORY, MemoryStore};
use crate::tools::{Capability, CapabilityFuture, CapabilityRegistry, parse_tool_args};
use crate::{ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const REMEMBER: &str = "remember";
pub const FORGET: &str = "forget";
pub const RECALL: &str = "recall";

// ── Typed arguments ────────────────────────────────────────────────

/// Typed arguments for `remember`.
#[derive(Deserialize, JsonSchema)]
pub struct RememberArgs {
    /// The fact to store, as one short sentence (e.g. 'Alice prefers terse answers').
    pub content: String,
    /// Category: user, preferences, patterns, issues, or general (default general).
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Typed arguments for `forget`.
#[derive(Deserialize, JsonSchema)]
pub struct ForgetArgs {
    /// Words describing the entries to remove.
    pub description: String,
}

/// Typed arguments for `recall`.
#[derive(Deserialize, JsonSchema)]
pub struct RecallArgs {
    /// Words to look for in stored memories.
    pub query: String,
}

// ── Remember ───────────────────────────────────────────────────────

/// Store a fact in persistent memory.
pub struct RememberTool {
    memory: Arc<MemoryStore>,
}

impl RememberTool {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

impl Capability for RememberTool {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            REMEMBER,
            "Store a fact about the user, the system, or a recurring pattern in persistent memory. \
             Memory is for learnings only: it cannot hold rules, instructions, or credentials.",
            json_schema_for::<RememberArgs>(),
        )
    }

    fn execute(&self, arguments: &Map<String, Value>) -> CapabilityFuture<'_> {
        let parsed = parse_tool_args::<RememberArgs>(arguments);
        Box::pin(async move {
            match parsed {
                Ok(args) => self.memory.remember(&args.content, &args.category),
                Err(e) => e,
            }
        })
    }
}

// ── Forget ─────────────────────────────────────────────────────────

/// Remove stored facts matching a description.
pub struct ForgetTool {
    memory: Arc<MemoryStore>,
}

impl ForgetTool {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

impl Capability for ForgetTool {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            FORGET,
            "Remove memory entries that match a description. An entry is removed when it shares \
             more than half of the description's words.",
            json_schema_for::<ForgetArgs>(),
        )
    }

    fn execute(&self, arguments: &Map<String, Value>) -> CapabilityFuture<'_> {
        let parsed = parse_tool_args::<ForgetArgs>(arguments);
        Box::pin(async move {
            match parsed {
                Ok(args) => self.memory.forget(&args.description),
                Err(e) => e,
            }
        })
    }
}

// ── Recall ─────────────────────────────────────────────────────────

/// Search persistent memory.
pub struct RecallTool {
    memory: Arc<MemoryStore>,
}

impl RecallTool {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

impl Capability for RecallTool {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            RECALL,
            "Search persistent memory for entries sharing words with the query. \
             Returns the whole memory when nothing matches.",
            json_schema_for::<RecallArgs>(),
        )
    }

    fn execute(&self, arguments: &Map<String, Value>) -> CapabilityFuture<'_> {
        let parsed = parse_tool_args::<RecallArgs>(arguments);
        Box::pin(async move {
            match parsed {
                Ok(args) => self.memory.recall(&args.query),
                Err(e) => e,
            }
        })
    }
}

/// Register `remember`, `forget`, and `recall` backed by `memory`.
pub fn register_memory_tools(registry: &mut CapabilityRegistry, memory: Arc<MemoryStore>) {
    registry.register(RememberTool::new(memory.clone()));
    registry.register(ForgetTool::new(memory.clone()));
    registry.register(RecallTool::new(memory));
}
