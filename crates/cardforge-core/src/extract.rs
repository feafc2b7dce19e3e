//! Payload extraction from loosely-structured model output.
//!
//! Models return the slide markup wrapped in a single JSON object
//! (`{"html": "..."}`), but rarely *only* that: the object arrives inside
//! a ```` ```json ```` fence, buried in polite prose, or with stray
//! characters around it. [`extract_markup`] deterministically isolates
//! and parses the object so every provider adapter shares one recovery
//! path.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ExtractError;

/// Matches the first ```` ```json ... ``` ```` fenced block, content
/// captured non-greedily across newlines.
fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap())
}

/// Extract the `html` field from raw model output.
///
/// Recovery steps, in order:
/// 1. If a ```` ```json ```` fence is present, keep only the content of
///    the first one.
/// 2. If the text still does not look like a complete object (start `{`,
///    end `}`), slice from the first `{` to the last `}` inclusive. This
///    recovers JSON embedded in leading/trailing prose.
/// 3. Parse as JSON. Any parse failure is an [`ExtractError`].
///
/// A successfully parsed object *without* an `html` field yields
/// `Ok("")`: callers treat empty markup as a provider-level failure and
/// move on to the next model variant, which keeps extraction compatible
/// with any valid-JSON response shape.
pub fn extract_markup(raw: &str) -> Result<String, ExtractError> {
    let mut text = raw.trim();

    if let Some(caps) = json_fence().captures(text) {
        if let Some(inner) = caps.get(1) {
            text = inner.as_str();
        }
    }

    let candidate: &str = if text.starts_with('{') && text.ends_with('}') {
        text
    } else {
        let start = text.find('{');
        let end = text.rfind('}');
        match (start, end) {
            (Some(s), Some(e)) if s < e => &text[s..=e],
            _ => return Err(ExtractError::NoJsonObject),
        }
    };

    let value: serde_json::Value = serde_json::from_str(candidate)
        .map_err(|e| ExtractError::InvalidJson(e.to_string()))?;

    if !value.is_object() {
        return Err(ExtractError::InvalidJson("root is not an object".into()));
    }

    Ok(value
        .get("html")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_object() {
        let markup = extract_markup(r#"{"html": "<div>A</div>"}"#).unwrap();
        assert_eq!(markup, "<div>A</div>");
    }

    #[test]
    fn fenced_block_with_prose() {
        let raw = "Sure! ```json\n{\"html\": \"<div>A</div>\"}\n```";
        assert_eq!(extract_markup(raw).unwrap(), "<div>A</div>");
    }

    #[test]
    fn prose_wrapped_object() {
        let raw = "prefix {\"html\": \"X\"} suffix";
        assert_eq!(extract_markup(raw).unwrap(), "X");
    }

    #[test]
    fn first_fence_wins() {
        let raw = "```json\n{\"html\": \"first\"}\n```\n```json\n{\"html\": \"second\"}\n```";
        assert_eq!(extract_markup(raw).unwrap(), "first");
    }

    #[test]
    fn not_json_at_all() {
        assert!(matches!(
            extract_markup("not json at all"),
            Err(ExtractError::NoJsonObject)
        ));
    }

    #[test]
    fn truncated_object_fails() {
        let raw = r#"{"html": "<div>cut off"#;
        // No closing brace: brace slicing cannot find a span, so this is
        // reported as "no object" rather than a parse error.
        assert!(extract_markup(raw).is_err());
    }

    #[test]
    fn broken_syntax_fails_with_invalid_json() {
        let raw = r#"{"html": <div>}"#;
        assert!(matches!(
            extract_markup(raw),
            Err(ExtractError::InvalidJson(_))
        ));
    }

    #[test]
    fn non_object_root_fails() {
        assert!(matches!(
            extract_markup(r#"["html"]"#),
            Err(ExtractError::NoJsonObject)
        ));
    }

    #[test]
    fn missing_html_field_is_lenient_empty() {
        assert_eq!(extract_markup(r#"{"markdown": "x"}"#).unwrap(), "");
    }

    #[test]
    fn idempotent_on_clean_input() {
        // Cleaning already-clean JSON is a no-op: the fence and prose
        // recovery steps must not mangle a well-formed object.
        let clean = r#"{"html": "<div/>"}"#;
        let direct = extract_markup(clean).unwrap();
        let wrapped = extract_markup(&format!("```json\n{clean}\n```")).unwrap();
        assert_eq!(direct, wrapped);
        assert_eq!(direct, "<div/>");
    }
}
