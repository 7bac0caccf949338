//! The bounded, tool-calling reasoning loop.
//!
//! [`Agent::handle`] turns one user message into a stream of text chunks:
//! one `[used: ...]` status per tool-calling turn, then the final answer (or
//! the turn-limit notice). [`Agent::respond`] drains the stream, returns the
//! last chunk, and schedules a background [reflection](reflection) pass.
//!
//! Only the terminal path writes to memory, and it writes exactly two
//! transcript entries: the user message and the final answer. Tool traffic,
//! status chunks, and aborted requests are never persisted.

pub mod events;
pub mod reflection;

pub use events::{
    AgentEvent, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
};
pub use reflection::ReflectionOutcome;

use crate::config::{ReflectionConfig, StewardConfig};
use crate::memory::MemoryStore;
use crate::prompt::PromptComposer;
use crate::tools::CapabilityRegistry;
use crate::{Message, ModelProvider};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, trace};

/// Final chunk when the turn budget runs out.
pub const TURN_LIMIT_NOTICE: &str = "[Reached max reasoning turns. Please try a simpler request.]";

/// Recorded answer when the model finishes without text.
pub const NO_RESPONSE: &str = "(No response)";

/// Start of the final chunk when the model provider fails.
pub const MODEL_FAILURE_PREFIX: &str = "[Model request failed: ";

/// A fresh conversation id: the first 8 hex characters of a UUID v4.
pub fn mint_conversation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// Whether `answer` is one of the loop's own notices rather than model text.
pub fn is_loop_notice(answer: &str) -> bool {
    answer == TURN_LIMIT_NOTICE
        || answer == NO_RESPONSE
        || answer.starts_with(MODEL_FAILURE_PREFIX)
}

/// Status chunk listing the tools used in one turn.
pub fn status_chunk(names: &[String]) -> String {
    format!("[used: {}]", names.join(", "))
}

/// The reasoning loop and everything it needs, shared behind `Arc`s so a
/// clone can move into the background reflection task.
#[derive(Clone)]
pub struct Agent {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<CapabilityRegistry>,
    composer: Arc<PromptComposer>,
    memory: Arc<MemoryStore>,
    events: Arc<dyn EventHandler>,
    max_turns: u32,
    history_window: usize,
    reflection: ReflectionConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("registry", &self.registry)
            .field("max_turns", &self.max_turns)
            .field("history_window", &self.history_window)
            .field("reflection", &self.reflection)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Build an agent. Turn budget, history window, and reflection settings
    /// are read from `config` once, here.
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<CapabilityRegistry>,
        composer: Arc<PromptComposer>,
        memory: Arc<MemoryStore>,
        config: &StewardConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            composer,
            memory,
            events: Arc::new(NoopHandler),
            max_turns: config.safety.max_agent_turns,
            history_window: config.agent.history_window,
            reflection: config.reflection.clone(),
        }
    }

    /// Route loop events to `handler`.
    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.events = Arc::new(handler);
        self
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Context for one request: system prompt, then the most recent
    /// `history_window` messages of stored history plus the new message.
    fn initial_context(&self, conversation_id: &str, message: &str) -> Vec<Message> {
        let mut history = self.memory.get_conversation(conversation_id);
        history.push(Message::user(message));
        let skip = history.len().saturating_sub(self.history_window);

        let mut context = Vec::with_capacity(history.len() - skip + 1);
        context.push(Message::system(self.composer.build()));
        context.extend(history.into_iter().skip(skip));
        context
    }

    /// Process one user message as a stream of text chunks.
    ///
    /// Yields `[used: a, b]` after each tool-calling turn and ends with the
    /// final answer, the turn-limit notice, or a model-failure notice. The
    /// stream is lazy: nothing happens until it is polled.
    pub fn handle<'a>(
        &'a self,
        message: &'a str,
        conversation_id: Option<String>,
    ) -> impl Stream<Item = String> + Send + 'a {
        stream! {
            let conversation_id = conversation_id.unwrap_or_else(mint_conversation_id);
            let mut messages = self.initial_context(&conversation_id, message);
            debug!(
                "[{conversation_id}] handling message ({} context messages)",
                messages.len()
            );

            let definitions = self.registry.list_definitions();
            let tools = (!definitions.is_empty()).then_some(definitions.as_slice());

            for turn in 1..=self.max_turns {
                self.events.on_event(&AgentEvent::TurnStart {
                    conversation_id: &conversation_id,
                    turn,
                    max_turns: self.max_turns,
                });

                let response = match self.provider.chat(&messages, tools).await {
                    Ok(response) => response,
                    Err(error) => {
                        self.events.on_event(&AgentEvent::ModelError { error: &error });
                        yield format!("{MODEL_FAILURE_PREFIX}{error}]");
                        return;
                    }
                };

                if !response.has_tool_calls() {
                    let answer = response
                        .text
                        .filter(|text| !text.trim().is_empty())
                        .unwrap_or_else(|| NO_RESPONSE.to_string());
                    self.memory
                        .append_to_conversation(&conversation_id, &Message::user(message));
                    self.memory.append_to_conversation(
                        &conversation_id,
                        &Message::assistant_text(answer.clone()),
                    );
                    self.events.on_event(&AgentEvent::Finished {
                        conversation_id: &conversation_id,
                        turns: turn,
                    });
                    yield answer;
                    return;
                }

                self.events.on_event(&AgentEvent::ToolCallsReceived {
                    turn,
                    count: response.tool_calls.len(),
                });
                let names: Vec<String> =
                    response.tool_calls.iter().map(|call| call.name.clone()).collect();
                messages.push(response.raw_message);

                for call in response.tool_calls {
                    self.events.on_event(&AgentEvent::ToolExecuting {
                        name: &call.name,
                        arguments: &call.arguments,
                    });
                    let result = self.registry.execute(&call.name, &call.arguments).await;
                    self.events.on_event(&AgentEvent::ToolResult {
                        name: &call.name,
                        call_id: &call.id,
                        result: &result,
                    });
                    trace!("[{conversation_id}] {} -> {} bytes", call.name, result.len());
                    messages.push(Message::tool_result(call.id, result));
                }

                yield status_chunk(&names);
            }

            self.events.on_event(&AgentEvent::TurnLimitReached {
                max_turns: self.max_turns,
            });
            yield TURN_LIMIT_NOTICE.to_string();
        }
    }

    /// Process one message and return only the final chunk.
    ///
    /// Schedules reflection on a detached task; the caller never waits for
    /// it and never sees its failures. Loop notices (turn limit, model
    /// failure, no response) are not reflected on.
    pub async fn respond(&self, message: &str, conversation_id: Option<String>) -> String {
        let chunks: Vec<String> = self.handle(message, conversation_id).collect().await;
        let answer = chunks.last().cloned().unwrap_or_else(|| NO_RESPONSE.to_string());

        if self.reflection.enabled && !is_loop_notice(&answer) {
            let agent = self.clone();
            let user_message = message.to_string();
            let final_answer = answer.clone();
            tokio::spawn(async move {
                agent.reflect(&user_message, &final_answer).await;
            });
        }

        answer
    }
}
