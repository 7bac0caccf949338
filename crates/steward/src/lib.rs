//! Reasoning core for an assistant that operates a fleet of bus-connected
//! devices ("nodes").
//!
//! `steward` provides the three pieces that keep such an assistant coherent
//! across turns and sessions:
//!
//! - the bounded, tool-calling reasoning loop ([`Agent`](agent::Agent)),
//! - the prompt composer that orders untrusted context below an immutable
//!   safety block ([`PromptComposer`](prompt::PromptComposer)),
//! - the persistent memory store whose write path rejects attempts to rewrite
//!   the safety policy ([`MemoryStore`](memory::MemoryStore)).
//!
//! Device actions, the model vendor, and any user interface live outside this
//! crate. Devices are reached through [`Capability`](tools::Capability)
//! implementors registered in a [`CapabilityRegistry`](tools::CapabilityRegistry);
//! the model is reached through the [`ModelProvider`] trait.
//!
//! # Getting started
//!
//! ```ignore
//! use std::sync::Arc;
//! use steward::prelude::*;
//!
//! let config = StewardConfig::load("steward.yaml")?;
//! let memory = Arc::new(MemoryStore::open("/var/lib/steward", &config.memory)?);
//!
//! let mut registry = CapabilityRegistry::new().with_arg_validation(true);
//! register_memory_tools(&mut registry, memory.clone());
//! let registry = Arc::new(registry);
//!
//! let composer = PromptComposer::new(
//!     "/etc/steward",
//!     SafetyParams::capture(&config),
//!     world_model,
//!     watchers,
//!     captures,
//!     registry.clone(),
//!     memory.clone(),
//! );
//!
//! let agent = Agent::new(provider, registry, Arc::new(composer), memory, &config);
//! let answer = agent.respond("What is running on the garage node?", None).await;
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Agent`](agent::Agent) turn loop, loop events, background reflection |
//! | [`prompt`] | [`SystemPromptBuilder`](prompt::SystemPromptBuilder), snapshot sources, [`PromptComposer`](prompt::PromptComposer) |
//! | [`memory`] | Memory document write path, injection filter, transcripts, memory tools |
//! | [`tools`] | [`Capability`](tools::Capability) trait and [`CapabilityRegistry`](tools::CapabilityRegistry) |
//! | [`config`] | YAML configuration surface |
//! | [`safety`] | Frozen [`SafetyParams`](safety::SafetyParams) and the safety block |

pub mod agent;
pub mod config;
pub mod memory;
pub mod prelude;
pub mod prompt;
pub mod safety;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// # Example
///
/// ```
/// use steward::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct RestartArgs {
///     node: String,
///     #[serde(default)]
///     force: Option<bool>,
/// }
///
/// let schema = json_schema_for::<RestartArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"node".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    /// Whether messages with this role belong in the durable transcript.
    pub fn is_persisted(&self) -> bool {
        matches!(self, MessageRole::User | MessageRole::Assistant)
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// The text content, or an empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition handed to the model provider (function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// The tool's name.
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call requested by the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

// ── Model provider ─────────────────────────────────────────────────

/// One model reply.
///
/// `raw_message` is the assistant message exactly as it must be echoed back
/// into context when the reply requests tools.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub raw_message: Message,
}

impl ModelResponse {
    /// A text-only reply.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw_message: Message::assistant_text(text.clone()),
            text: Some(text),
            tool_calls: Vec::new(),
        }
    }

    /// A reply that requests tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            raw_message: Message::assistant_tool_calls(calls.clone()),
            text: None,
            tool_calls: calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Boxed future returned by [`ModelProvider::chat`].
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ModelResponse, String>> + Send + 'a>>;

/// The language model, as seen by the reasoning loop.
///
/// Vendor integrations implement this trait. Uses a boxed future so the trait
/// stays dyn-compatible and can be shared as `Arc<dyn ModelProvider>`.
pub trait ModelProvider: Send + Sync {
    /// Send the conversation and the available tool definitions.
    ///
    /// `tools` is `None` when no tools are on offer for this call.
    fn chat<'a>(
        &'a self,
        messages: &'a [Message],
        tools: Option<&'a [ToolDef]>,
    ) -> ChatFuture<'a>;
}
