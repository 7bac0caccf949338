//! Post-exchange reflection: a short, tool-restricted model pass that may
//! store learnings from the exchange that just finished.
//!
//! Reflection only ever sees the `remember` capability. It runs detached from
//! the request (see [`Agent::respond`]); its outcome is observable through
//! events and logs only.

use super::Agent;
use super::events::AgentEvent;
use crate::Message;
use crate::memory::tools::{REMEMBER, RememberTool};
use crate::tools::CapabilityRegistry;
use tracing::{debug, info};

/// User messages shorter than this (in chars) may be trivial.
const TRIVIAL_MESSAGE_CHARS: usize = 10;
/// Answers shorter than this (in chars) may be trivial.
const TRIVIAL_ANSWER_CHARS: usize = 50;

const REFLECTION_SYSTEM: &str = "You are reflecting on a conversation to extract learnings. \
Be selective: only remember genuinely useful insights, not trivial details.";

/// What a reflection pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionOutcome {
    /// Disabled in configuration.
    Disabled,
    /// The exchange was too short to learn from.
    Skipped,
    /// The pass ran; `writes` entries were accepted by the memory store.
    Completed { rounds: u32, writes: usize },
    /// The model call failed.
    Failed(String),
}

/// Both sides of the exchange are short.
pub fn is_trivial(user_message: &str, answer: &str) -> bool {
    user_message.chars().count() < TRIVIAL_MESSAGE_CHARS
        && answer.chars().count() < TRIVIAL_ANSWER_CHARS
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// The user turn of the reflection conversation.
pub fn reflection_prompt(
    user_message: &str,
    answer: &str,
    memory: &str,
    excerpt_chars: usize,
) -> String {
    let memory = if memory.is_empty() {
        "(empty)".to_string()
    } else {
        excerpt(memory, excerpt_chars)
    };
    format!(
        "Review this interaction and decide if anything is worth remembering for future conversations.

USER: {user_message}

YOUR RESPONSE: {answer}

EXISTING MEMORY:
{memory}

If you learn something new and useful about the user (their name, preferences, expertise level, \
what they care about, their communication style) or about the system (a pattern, a recurring issue, \
a fix that worked), call the `remember` tool.

Categories: \"user\" for user info, \"patterns\" for system patterns, \"preferences\" for user \
workflow preferences, \"issues\" for problems and fixes.

If nothing new or useful was revealed, just respond with \"Nothing to remember.\" and do NOT call any tools.",
        answer = excerpt(answer, excerpt_chars),
    )
}

impl Agent {
    /// Run one reflection pass over a finished exchange and wait for it.
    ///
    /// Never fails: model errors end the pass and are reported in the
    /// outcome.
    pub async fn reflect(&self, user_message: &str, answer: &str) -> ReflectionOutcome {
        if !self.reflection.enabled {
            return ReflectionOutcome::Disabled;
        }
        if is_trivial(user_message, answer) {
            self.events.on_event(&AgentEvent::ReflectionSkipped);
            return ReflectionOutcome::Skipped;
        }

        let remember = CapabilityRegistry::new().with(RememberTool::new(self.memory.clone()));
        let definitions = remember.list_definitions();

        let mut messages = vec![
            Message::system(REFLECTION_SYSTEM),
            Message::user(reflection_prompt(
                user_message,
                answer,
                &self.memory.get_all(),
                self.reflection.excerpt_chars,
            )),
        ];

        let mut rounds = 0;
        let mut writes = 0;
        while rounds < self.reflection.max_rounds {
            rounds += 1;
            let response = match self
                .provider
                .chat(&messages, Some(definitions.as_slice()))
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    self.events.on_event(&AgentEvent::ReflectionFailed { error: &error });
                    debug!("Reflection failed (non-critical): {error}");
                    return ReflectionOutcome::Failed(error);
                }
            };
            if !response.has_tool_calls() {
                break;
            }

            messages.push(response.raw_message);
            for call in response.tool_calls {
                let result = if call.name == REMEMBER {
                    let result = remember.execute(&call.name, &call.arguments).await;
                    if result.starts_with("Remembered under") {
                        writes += 1;
                        info!(
                            "Reflection remembered: {}",
                            serde_json::Value::Object(call.arguments.clone())
                        );
                    }
                    result
                } else {
                    format!(
                        "Error: only `{REMEMBER}` is available during reflection, not '{}'",
                        call.name
                    )
                };
                messages.push(Message::tool_result(call.id, result));
            }
        }

        self.events
            .on_event(&AgentEvent::ReflectionFinished { rounds, writes });
        debug!("Reflection finished: {writes} write(s) in {rounds} round(s)");
        ReflectionOutcome::Completed { rounds, writes }
    }
}
