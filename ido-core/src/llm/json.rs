//! Lenient JSON extraction from model output.
//!
//! Models wrap JSON in code fences or prose despite instructions. The
//! extractor tries a direct parse, then fenced blocks, then the widest
//! brace/bracket span, and reports failure as an [`IdoError::Llm`] so the
//! caller selects its fallback branch explicitly.

use serde_json::Value;

use crate::error::{IdoError, Result};

pub fn extract_json(content: &str) -> Result<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(fenced.trim())
    {
        return Ok(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(span) = widest_span(trimmed, open, close)
            && let Ok(value) = serde_json::from_str::<Value>(span)
        {
            return Ok(value);
        }
    }

    Err(IdoError::Llm(format!(
        "no JSON payload found in model output ({} chars)",
        content.len()
    )))
}

/// Body of the first ``` fence, tolerating a language tag after the
/// opening backticks.
fn fenced_block(content: &str) -> Option<&str> {
    let start = content.find("```")?;
    let after = &content[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn widest_span(content: &str, open: char, close: char) -> Option<&str> {
    let start = content.find(open)?;
    let end = content.rfind(close)?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let value = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parses_fenced_json() {
        let content = "Here you go:\n```json\n{\"activities\": []}\n```\nDone.";
        let value = extract_json(content).unwrap();
        assert!(value["activities"].as_array().unwrap().is_empty());
    }

    #[test]
    fn parses_wrapped_json() {
        let content = "The result is {\"ok\": true} as requested.";
        let value = extract_json(content).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn parses_wrapped_array() {
        let content = "items: [1, 2, 3].";
        let value = extract_json(content).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
    }

    #[test]
    fn rejects_plain_prose() {
        assert!(extract_json("no structured payload here").is_err());
    }
}
