//! Extracts the change-set JSON document from a model reply.
//!
//! Models wrap answers in markdown fences or add prose around the object
//! despite instructions, so the parser strips fences and takes the
//! outermost `{...}` fragment before handing anything to the validator.

use anyhow::{anyhow, Result};
use serde_json::Value;

/// Strip markdown code fences from a response.
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if trimmed.starts_with("```json") {
        trimmed.strip_prefix("```json").unwrap_or(trimmed)
    } else if trimmed.starts_with("```") {
        trimmed.strip_prefix("```").unwrap_or(trimmed)
    } else {
        trimmed
    };
    let clean = if clean.ends_with("```") {
        clean.strip_suffix("```").unwrap_or(clean)
    } else {
        clean
    };
    clean.trim()
}

/// The outermost `{...}` fragment, if the text contains one.
fn extract_json_fragment(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Parse a model reply into a candidate change-set document.
///
/// This only gets the text into JSON form; conformance to the change-set
/// schema is the validator's job.
pub fn extract_document(response: &str) -> Result<Value> {
    let clean = strip_markdown_fences(response);
    let fragment = extract_json_fragment(clean)
        .ok_or_else(|| anyhow!("No JSON object found in model response"))?;

    serde_json::from_str(fragment)
        .map_err(|e| anyhow!("Model response is not valid JSON: {}", e))
}
