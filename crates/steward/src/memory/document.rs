//! Text operations on the memory document.
//!
//! The document is plain Markdown:
//!
//! ```text
//! # Agent Memory
//!
//! ## User
//! - Alice runs the garage cluster
//!
//! ## Preferences
//! - Alice prefers terse answers
//! ```
//!
//! These functions are pure; [`MemoryStore`](super::MemoryStore) owns the file.

use std::collections::HashSet;

/// Title line of a fresh document.
pub const MEMORY_TITLE: &str = "# Agent Memory";

/// Categories that can never be written to.
pub const RESERVED_CATEGORIES: [&str; 6] =
    ["safety", "rules", "system", "config", "prompt", "instructions"];

/// Categories suggested to the model when it picks a reserved one.
pub const SUGGESTED_CATEGORIES: &str = "user, preferences, patterns, issues, or general";

/// Longest accepted category name, in chars.
pub const MAX_CATEGORY_CHARS: usize = 40;

/// Headers whose entries personalize the prompt.
const USER_HEADERS: [&str; 2] = ["## User", "## Preferences"];

const BULLET: &str = "- ";

/// An empty document: the title and a blank line.
pub fn empty_document() -> String {
    format!("{MEMORY_TITLE}\n\n")
}

/// Document content without the bare title. Empty when nothing is stored.
pub fn content_of(doc: &str) -> &str {
    let trimmed = doc.trim();
    if trimmed == MEMORY_TITLE { "" } else { trimmed }
}

/// Whether `category`, or any line of the header it would render to, names a
/// reserved category.
pub fn is_reserved(category: &str) -> bool {
    category.lines().any(|line| {
        let name = line.trim().trim_start_matches('#').trim().to_lowercase();
        RESERVED_CATEGORIES.contains(&name.as_str())
    })
}

/// A category renders to exactly one header line: short, no control
/// characters, no `#`.
pub fn is_well_formed_category(category: &str) -> bool {
    let category = category.trim();
    category.chars().count() <= MAX_CATEGORY_CHARS
        && !category.chars().any(|c| c.is_control() || c == '#')
}

/// Capitalize the first letter of every word, lowercase the rest.
///
/// A "word" starts after any non-alphabetic character, so `home_lab` becomes
/// `Home_Lab`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// `## <Title Cased Category>`.
pub fn category_header(category: &str) -> String {
    format!("## {}", title_case(category.trim()))
}

fn is_section_header(line: &str) -> bool {
    line.starts_with("## ")
}

/// The entry text of a bullet line, if `line` is one.
pub fn bullet_text(line: &str) -> Option<&str> {
    line.trim().strip_prefix(BULLET)
}

/// Lowercased whitespace-separated words.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Number of bullet entries under `category`.
pub fn count_entries(doc: &str, category: &str) -> usize {
    let header = category_header(category);
    let mut in_section = false;
    let mut count = 0;
    for line in doc.lines() {
        if line.trim() == header {
            in_section = true;
        } else if is_section_header(line) {
            in_section = false;
        } else if in_section && bullet_text(line).is_some() {
            count += 1;
        }
    }
    count
}

/// Insert `entry` as the last bullet of `category`, creating the section at
/// the end of the document if it does not exist yet.
pub fn insert_entry(doc: &str, category: &str, entry: &str) -> String {
    let header = category_header(category);
    let mut lines: Vec<&str> = doc.split('\n').collect();

    let Some(start) = lines.iter().position(|l| l.trim() == header) else {
        return format!("{}\n\n{header}\n{BULLET}{entry}\n", doc.trim_end());
    };

    let end = lines
        .iter()
        .skip(start + 1)
        .position(|l| is_section_header(l))
        .map_or(lines.len(), |offset| start + 1 + offset);

    // After the section's last non-blank line, so blank separators stay put.
    let insert_at = (start..end)
        .rev()
        .find(|&i| !lines[i].trim().is_empty())
        .map_or(start + 1, |i| i + 1);

    let bullet = format!("{BULLET}{entry}");
    lines.insert(insert_at, &bullet);
    lines.join("\n")
}

/// Remove every bullet whose word overlap with `query` is strictly greater
/// than half of the query's word count.
///
/// Returns the new document and the removed entries, in document order.
pub fn remove_matching(doc: &str, query: &str) -> (String, Vec<String>) {
    let query_words = tokenize(query);
    let mut removed = Vec::new();
    let mut kept = Vec::new();

    for line in doc.split('\n') {
        if let Some(entry) = bullet_text(line) {
            let overlap = tokenize(entry).intersection(&query_words).count();
            // overlap > len / 2, without flooring the half.
            if overlap * 2 > query_words.len() {
                removed.push(entry.to_string());
                continue;
            }
        }
        kept.push(line);
    }

    (kept.join("\n"), removed)
}

/// Bullet entries sharing at least one word with `query`, as
/// `(section, entry)` pairs.
pub fn search(doc: &str, query: &str) -> Vec<(String, String)> {
    let query_words = tokenize(query);
    let mut section = "general".to_string();
    let mut matches = Vec::new();

    for line in doc.lines() {
        if let Some(name) = line.strip_prefix("## ") {
            section = name.trim().to_string();
        } else if let Some(entry) = bullet_text(line)
            && tokenize(entry).intersection(&query_words).next().is_some()
        {
            matches.push((section.clone(), entry.to_string()));
        }
    }
    matches
}

/// Non-blank lines under the `## User` and `## Preferences` headers.
pub fn user_lines(doc: &str) -> Vec<&str> {
    let mut in_user_section = false;
    let mut out = Vec::new();
    for line in doc.lines() {
        let trimmed = line.trim();
        if USER_HEADERS.contains(&trimmed) {
            in_user_section = true;
        } else if is_section_header(line) {
            in_user_section = false;
        } else if in_user_section && !trimmed.is_empty() {
            out.push(trimmed);
        }
    }
    out
}
