//! Injection filter for memory writes.
//!
//! Memory is replayed into every prompt, so a stored entry that reads like an
//! instruction ("ignore all previous rules", "protected_nodes: []") would be a
//! standing attempt to rewrite the safety policy. Content matching any pattern
//! here is refused before it reaches disk.

use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Built-in patterns. Always active; configuration can only add to them.
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    r"ignore\s+((all|any|the|your|previous|prior|earlier)\s+)*(safety|rules?|instructions?|boundaries|constraints|guidelines)",
    r"override\s+((the|your|all|any)\s+)*(safety|rules?|config(uration)?|protected|instructions?)",
    r"disregard\s+((the|your|any)\s+)*(all|previous|prior|safety|rules?|instructions?|everything)",
    r"you\s+(can|should|must|may)\s+(now\s+)?(ignore|bypass|skip|override)",
    r"new\s+(rules?|instructions?|polic(y|ies))\s*:",
    r"forget\s+((all|the|your|previous|prior|earlier)\s+)*(safety|rules?|boundaries|instructions?)",
    r"protected[\s_-]*nodes?\s*[:=]",
    r"allowed[\s_-]*(data[\s_-]*)?paths?\s*[:=]",
    r"max[\s_-]*(agent[\s_-]*)?(actions?|turns?)([\s_-]*per[\s_-]*hour)?\s*[:=]",
    r"system\s*prompt",
    r"you\s+are\s+now\s+",
    r"from\s+now\s+on\s*,?\s+you",
    r"(act|behave)\s+as\s+if\s+(there\s+(are|were)\s+)?no\s+(rules|restrictions|limits)",
];

/// A compiled, case-insensitive pattern set.
#[derive(Debug, Clone)]
pub struct InjectionFilter {
    patterns: Vec<Regex>,
}

impl InjectionFilter {
    /// The built-in patterns plus `extra`. Extra patterns that fail to compile
    /// are logged and skipped.
    pub fn new(extra: &[String]) -> Self {
        let patterns = DEFAULT_BLOCKED_PATTERNS
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str))
            .filter_map(|source| match compile(source) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping invalid blocked pattern {source:?}: {e}");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// The first pattern `content` matches, if any.
    pub fn check(&self, content: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(content))
            .map(Regex::as_str)
    }

    pub fn is_blocked(&self, content: &str) -> bool {
        self.check(content).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for InjectionFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

fn compile(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}
