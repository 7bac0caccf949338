//! Structured system prompt builder.
//!
//! [`SystemPromptBuilder`] assembles a prompt from ordered sections, with
//! conditional and optional sections and raw text blocks. [`seal`] closes the
//! prompt with a trailer that is guaranteed to come last.
//!
//! [`seal`]: SystemPromptBuilder::seal

/// Builder for multi-section system prompts.
///
/// Sections are joined with double newlines. Empty sections (blank content,
/// `section_if` with a false condition, `section_opt` with `None`) are
/// skipped.
///
/// # Example
///
/// ```
/// use steward::prompt::SystemPromptBuilder;
///
/// let prompt = SystemPromptBuilder::new("# Steward")
///     .section("Current System State", "3 nodes online.")
///     .section_if(false, "Active Watchers", || "never rendered".into())
///     .section_opt("Memory", None::<String>)
///     .seal("## IMMUTABLE SAFETY RULES\n...");
///
/// assert!(prompt.contains("## Current System State\n3 nodes online."));
/// assert!(!prompt.contains("Active Watchers"));
/// assert!(prompt.ends_with("## IMMUTABLE SAFETY RULES\n..."));
/// ```
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    sections: Vec<String>,
}

impl SystemPromptBuilder {
    /// Start with a preamble, included as-is.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: Vec::new(),
        }
        .raw(preamble)
    }

    /// Append `## heading` followed by `content` on the next line.
    ///
    /// Skipped if `content` is blank.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.trim().is_empty() {
            self.sections.push(format!("## {heading}\n{}", content.trim_end()));
        }
        self
    }

    /// Append a section only when `condition` holds. `content_fn` is not
    /// called otherwise.
    pub fn section_if(
        self,
        condition: bool,
        heading: &str,
        content_fn: impl FnOnce() -> String,
    ) -> Self {
        if condition {
            self.section(heading, content_fn())
        } else {
            self
        }
    }

    /// Append a section only if the content is `Some`.
    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    /// Append raw text without a heading. Skipped if blank.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.trim().is_empty() {
            self.sections.push(content.trim_end().to_string());
        }
        self
    }

    /// Join all sections with double newlines.
    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }

    /// Append `trailer` unconditionally and build. Consumes the builder, so
    /// nothing can be added after the trailer.
    pub fn seal(mut self, trailer: impl Into<String>) -> String {
        self.sections.push(trailer.into());
        self.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_only() {
        assert_eq!(SystemPromptBuilder::new("You are a steward.").build(), "You are a steward.");
    }

    #[test]
    fn sections_get_level_two_headings() {
        let prompt = SystemPromptBuilder::new("Preamble")
            .section("Context", "Some context\n")
            .build();
        assert_eq!(prompt, "Preamble\n\n## Context\nSome context");
    }

    #[test]
    fn blank_sections_skipped() {
        let prompt = SystemPromptBuilder::new("Preamble")
            .section("Empty", "  \n")
            .raw("")
            .section("Present", "content")
            .build();
        assert!(!prompt.contains("Empty"));
        assert_eq!(prompt, "Preamble\n\n## Present\ncontent");
    }

    #[test]
    fn conditional_and_optional_sections() {
        let prompt = SystemPromptBuilder::new("Preamble")
            .section_if(true, "Active", || "yes".into())
            .section_if(false, "Inactive", || panic!("must not be evaluated"))
            .section_opt("Some", Some("present"))
            .section_opt("None", None::<String>)
            .raw("tail")
            .build();
        assert!(prompt.contains("## Active\nyes"));
        assert!(!prompt.contains("Inactive"));
        assert!(prompt.contains("## Some\npresent"));
        assert!(!prompt.contains("## None"));
        assert!(prompt.ends_with("tail"));
    }

    #[test]
    fn seal_is_last_and_kept_even_when_others_skip() {
        let prompt = SystemPromptBuilder::new("")
            .section("Skipped", "")
            .seal("TRAILER");
        assert_eq!(prompt, "TRAILER");

        let prompt = SystemPromptBuilder::new("Preamble")
            .section("A", "a")
            .seal("TRAILER");
        assert_eq!(prompt, "Preamble\n\n## A\na\n\nTRAILER");
    }
}
