//! Shared fixtures: a scripted model and a fully wired agent in a temp dir.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use steward::prelude::*;

/// Replays scripted replies in order and records what it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelResponse, String>>>,
    pub contexts: Mutex<Vec<Vec<Message>>>,
    pub offered_tools: Mutex<Vec<Option<Vec<String>>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ModelResponse, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            contexts: Mutex::new(Vec::new()),
            offered_tools: Mutex::new(Vec::new()),
        })
    }

    /// A model that requests `tool` with `args` on every call.
    pub fn always_calling(tool: &str, args: Value, times: usize) -> Arc<Self> {
        let replies = (0..times)
            .map(|i| {
                let id = format!("call-{i}");
                Ok(ModelResponse::tool_calls(vec![call(&id, tool, args.clone())]))
            })
            .collect();
        Self::new(replies)
    }

    pub fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }
}

impl ModelProvider for ScriptedModel {
    fn chat<'a>(
        &'a self,
        messages: &'a [Message],
        tools: Option<&'a [ToolDef]>,
    ) -> ChatFuture<'a> {
        self.contexts.lock().unwrap().push(messages.to_vec());
        self.offered_tools
            .lock()
            .unwrap()
            .push(tools.map(|defs| defs.iter().map(|d| d.name().to_string()).collect()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ModelResponse::text("Nothing to remember.")));
        Box::pin(async move { reply })
    }
}

pub fn call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name, args.as_object().cloned().unwrap_or_default())
}

#[derive(Deserialize, JsonSchema)]
struct NodeStatusArgs {
    /// Node to inspect.
    node: String,
}

/// A device-side capability standing in for the bus.
pub fn node_status() -> FnCapability {
    FnCapability::new(
        ToolDef::new(
            "node_status",
            "Report whether a node is running",
            json_schema_for::<NodeStatusArgs>(),
        ),
        |args: NodeStatusArgs| async move { format!("{} is running", args.node) },
    )
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub memory: Arc<MemoryStore>,
    pub model: Arc<ScriptedModel>,
    pub agent: Agent,
}

pub fn harness(model: Arc<ScriptedModel>, config: StewardConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let memory = Arc::new(MemoryStore::open(dir.path().join("data"), &config.memory).unwrap());

    let mut registry = CapabilityRegistry::new().with(node_status());
    register_memory_tools(&mut registry, memory.clone());
    let registry = Arc::new(registry);

    let composer = PromptComposer::new(
        dir.path(),
        SafetyParams::capture(&config),
        Arc::new(StaticSnapshot::new("garage: running\ngreenhouse: stopped")),
        Arc::new(StaticSnapshot::empty()),
        Arc::new(StaticSnapshot::empty()),
        registry.clone(),
        memory.clone(),
    );

    let agent = Agent::new(
        model.clone(),
        registry,
        Arc::new(composer),
        memory.clone(),
        &config,
    );
    Harness {
        dir,
        memory,
        model,
        agent,
    }
}

/// Default configuration with background reflection off, so tests that
/// count model calls are not raced by a detached task.
pub fn quiet_config() -> StewardConfig {
    let mut config = StewardConfig::default();
    config.reflection.enabled = false;
    config
}

pub fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn no_args() -> Value {
    json!({})
}
