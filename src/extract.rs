//! Structured-text extraction from model replies
//!
//! Model replies often wrap a JSON object in prose and a fenced code block.
//! Extraction only locates the candidate text; parsing and validation belong
//! to [`crate::schema`].

use std::sync::LazyLock;

use regex::Regex;

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

/// Locate the structured payload inside a model reply
///
/// Returns the trimmed interior of a ` ```json ` fenced block when one is
/// present, otherwise the trimmed text itself when it looks like a complete
/// object, otherwise `None`.
#[must_use]
pub fn extract_structured(raw: &str) -> Option<&str> {
    if let Some(caps) = JSON_FENCE.captures(raw) {
        return caps.get(1).map(|m| m.as_str().trim());
    }

    let trimmed = raw.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}')).then_some(trimmed)
}
