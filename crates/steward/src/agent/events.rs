//! Events emitted by the [`Agent`](super::Agent) and the handlers that
//! observe them.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Default; tests |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Several handlers in order |

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Lifecycle events of one request and of its reflection pass.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A reasoning turn is starting (1-based).
    TurnStart {
        conversation_id: &'a str,
        turn: u32,
        max_turns: u32,
    },
    /// The model requested tools this turn.
    ToolCallsReceived { turn: u32, count: usize },
    /// A capability is about to run.
    ToolExecuting {
        name: &'a str,
        arguments: &'a Map<String, Value>,
    },
    /// A capability finished.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
    },
    /// The model answered without requesting tools.
    Finished { conversation_id: &'a str, turns: u32 },
    /// The turn budget ran out.
    TurnLimitReached { max_turns: u32 },
    /// The model provider returned an error.
    ModelError { error: &'a str },
    /// Reflection was not attempted for a trivial exchange.
    ReflectionSkipped,
    /// Reflection ran to completion.
    ReflectionFinished { rounds: u32, writes: usize },
    /// Reflection failed; the exchange itself is unaffected.
    ReflectionFailed { error: &'a str },
}

/// Observer for [`AgentEvent`]s.
///
/// Handlers run inline on the loop's task and should return quickly.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let AgentEvent::ToolResult { name, .. } = event {
///         println!("ran {name}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::TurnStart {
                conversation_id,
                turn,
                max_turns,
            } => {
                debug!("[{conversation_id}] turn {turn}/{max_turns}");
            }
            AgentEvent::ToolCallsReceived { turn, count } => {
                debug!("{count} tool call(s) in turn {turn}");
            }
            AgentEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            AgentEvent::ToolResult { name, result, .. } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            AgentEvent::Finished {
                conversation_id,
                turns,
            } => {
                info!("[{conversation_id}] answered after {turns} turn(s)");
            }
            AgentEvent::TurnLimitReached { max_turns } => {
                info!("Agent hit turn limit ({max_turns})");
            }
            AgentEvent::ModelError { error } => {
                warn!("Model request failed: {error}");
            }
            AgentEvent::ReflectionSkipped => {
                debug!("Reflection skipped (trivial exchange)");
            }
            AgentEvent::ReflectionFinished { rounds, writes } => {
                debug!("Reflection finished: {writes} write(s) in {rounds} round(s)");
            }
            AgentEvent::ReflectionFailed { error } => {
                debug!("Reflection failed: {error}");
            }
        }
    }
}
