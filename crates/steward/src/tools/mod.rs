//! Capability abstraction: the tools the model can invoke.
//!
//! The [`Capability`] trait defines the interface every tool implements: a
//! static definition (name, description, JSON schema) and an async `execute`
//! method. Capabilities are collected into a [`CapabilityRegistry`] which
//! handles ordered definition export, schema validation, dispatch, and result
//! truncation.
//!
//! Device management (scaffolding nodes, installing services, talking to the
//! message bus) lives outside this crate and plugs in here.

use crate::ToolDef;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for a capability result before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Listing returned by [`CapabilityRegistry::describe_all`] when nothing is
/// registered.
pub const NO_CAPABILITIES: &str = "No capabilities registered.";

/// Boxed future returned by [`Capability::execute`].
pub type CapabilityFuture<'a> = Pin<Box<dyn Future<Output = String> + Send + 'a>>;

// ── Capability trait ───────────────────────────────────────────────

/// A tool the model can invoke via function-calling.
///
/// Errors are returned as `"Error: ..."` strings rather than panicking; the
/// loop hands the string back to the model as the tool result either way.
pub trait Capability: Send + Sync {
    /// The definition sent to the model.
    fn definition(&self) -> ToolDef;

    /// Execute with already-parsed JSON arguments.
    fn execute(&self, arguments: &Map<String, Value>) -> CapabilityFuture<'_>;

    /// The capability's name (delegates to the definition).
    fn name(&self) -> String {
        self.definition().function.name.clone()
    }
}

// ── CapabilityRegistry ─────────────────────────────────────────────

/// Ordered collection of capabilities dispatched by name.
///
/// # Example
///
/// ```ignore
/// let mut registry = CapabilityRegistry::new()
///     .with_arg_validation(true)
///     .with(NodeStatus::new(bus.clone()))
///     .with(RestartNode::new(bus));
/// register_memory_tools(&mut registry, memory);
///
/// let defs = registry.list_definitions();
/// let out = registry.execute("node_status", &args).await;
/// ```
pub struct CapabilityRegistry {
    capabilities: Vec<Box<dyn Capability>>,
    index: HashMap<String, usize>,
    max_result_bytes: usize,
    /// Whether to validate arguments against the JSON Schema before dispatch.
    validate_args: bool,
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .field("max_result_bytes", &self.max_result_bytes)
            .field("validate_args", &self.validate_args)
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: Vec::new(),
            index: HashMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: true,
        }
    }

    /// Set the maximum result size in bytes before truncation.
    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Toggle JSON Schema argument validation before dispatch (on by default).
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Register a capability. A capability with the same name is replaced in
    /// place, keeping its original position.
    pub fn register(&mut self, capability: impl Capability + 'static) {
        let name = capability.name();
        match self.index.get(&name) {
            Some(&idx) => self.capabilities[idx] = Box::new(capability),
            None => {
                self.index.insert(name, self.capabilities.len());
                self.capabilities.push(Box::new(capability));
            }
        }
    }

    /// Register a capability (builder pattern).
    pub fn with(mut self, capability: impl Capability + 'static) -> Self {
        self.register(capability);
        self
    }

    /// All definitions, in registration order.
    pub fn list_definitions(&self) -> Vec<ToolDef> {
        self.capabilities.iter().map(|c| c.definition()).collect()
    }

    /// The definition of a single capability.
    pub fn definition(&self, name: &str) -> Option<ToolDef> {
        self.get(name).map(|c| c.definition())
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.capabilities.iter().map(|c| c.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Human-readable listing for prompt inclusion.
    pub fn describe_all(&self) -> String {
        if self.capabilities.is_empty() {
            return NO_CAPABILITIES.to_string();
        }
        self.capabilities
            .iter()
            .map(|c| {
                let def = c.definition();
                format!("- {}: {}", def.function.name, def.function.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.index
            .get(name)
            .and_then(|&idx| self.capabilities.get(idx))
            .map(|c| c.as_ref())
    }

    /// Execute a capability by name.
    ///
    /// Never fails: unknown names, validation failures, and capability errors
    /// all come back as text for the model to read. Long results are
    /// truncated.
    pub async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> String {
        let capability = match self.get(name) {
            Some(c) => c,
            None => return format!("Error: unknown tool '{name}'"),
        };

        if self.validate_args
            && let Some(error) = validate_arguments(capability, arguments)
        {
            return error;
        }

        log_tool_call(name, arguments);
        let start = std::time::Instant::now();
        let result = capability.execute(arguments).await;

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            result.len()
        );
        trace!("Tool {name} result preview: {}", preview(&result, 300));

        truncate_result(result, self.max_result_bytes)
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── FnCapability ───────────────────────────────────────────────────

/// Type-erased async handler for [`FnCapability`].
type ErasedHandler = Box<dyn Fn(Value) -> CapabilityFuture<'static> + Send + Sync>;

/// A closure-based capability that parses typed arguments and delegates to a
/// handler.
///
/// Use it for stateless capabilities; capabilities holding shared state
/// (bus clients, stores) are clearer as a struct implementing [`Capability`].
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct StatusArgs {
///     /// Node to inspect.
///     node: String,
/// }
///
/// let status = FnCapability::new(
///     ToolDef::new("node_status", "Report a node's state", json_schema_for::<StatusArgs>()),
///     |args: StatusArgs| async move { format!("{} is running", args.node) },
/// );
/// ```
pub struct FnCapability {
    def: ToolDef,
    handler: ErasedHandler,
}

impl FnCapability {
    pub fn new<A, F, Fut>(def: ToolDef, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let erased = move |raw: Value| -> CapabilityFuture<'static> {
            match serde_json::from_value::<A>(raw) {
                Ok(args) => Box::pin(handler(args)),
                Err(e) => Box::pin(async move { invalid_arguments(e) }),
            }
        };
        Self {
            def,
            handler: Box::new(erased),
        }
    }
}

impl Capability for FnCapability {
    fn definition(&self) -> ToolDef {
        self.def.clone()
    }

    fn execute(&self, arguments: &Map<String, Value>) -> CapabilityFuture<'_> {
        (self.handler)(Value::Object(arguments.clone()))
    }
}

impl fmt::Debug for FnCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCapability")
            .field("name", &self.def.function.name)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate arguments against the capability's declared JSON Schema.
///
/// Returns `None` if valid, or an error string the model can act on.
pub fn validate_arguments(
    capability: &dyn Capability,
    arguments: &Map<String, Value>,
) -> Option<String> {
    let schema = capability.definition().function.parameters;

    // An invalid schema is the capability author's problem; skip validation.
    let validator = jsonschema::validator_for(&schema).ok()?;

    let instance = Value::Object(arguments.clone());
    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{}':\n{}\n\
             Please fix the arguments and try again.",
            capability.name(),
            errors.join("\n")
        ))
    }
}

/// Parse JSON arguments into a typed struct, or an error string suitable for
/// returning straight from [`Capability::execute`].
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(
    arguments: &Map<String, Value>,
) -> Result<T, String> {
    serde_json::from_value(Value::Object(arguments.clone())).map_err(invalid_arguments)
}

fn invalid_arguments(e: serde_json::Error) -> String {
    format!(
        "Error: invalid tool arguments: {e}. \
         Please provide valid JSON matching the tool's parameter schema."
    )
}

/// Log a capability call at INFO with a truncated argument preview.
pub fn log_tool_call(name: &str, arguments: &Map<String, Value>) {
    let rendered = Value::Object(arguments.clone()).to_string();
    info!(
        "[tool] {name}({}{})",
        preview(&rendered, 120),
        if rendered.chars().count() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {rendered}");
}

/// Truncate a string to at most `max` bytes (on a char boundary), appending a
/// notice if trimmed.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    let total = s.len();
    let mut out = s;
    out.truncate(cut);
    out.push_str(&format!("...\n[truncated: {total} bytes total]"));
    out
}

pub(crate) fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
