//! Turning model output into JSON.
//!
//! Models like to wrap JSON in a markdown code fence, optionally tagged
//! `json`. The fence is stripped before parsing.

use kubesim_core::{SimError, SimResult};
use serde_json::Value;

/// Strip a surrounding code fence, if any.
#[must_use]
pub fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (`json`, `JSON`, ...) up to the end of the line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse model output as JSON.
pub fn extract_json(raw: &str) -> SimResult<Value> {
    let body = strip_fence(raw);
    serde_json::from_str(body).map_err(|e| {
        SimError::generation(format!("Generated response is not valid JSON: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(extract_json(r#"{"kind":"Pod"}"#).unwrap(), json!({"kind": "Pod"}));
    }

    #[test]
    fn test_json_fence() {
        let raw = "```json\n{\"kind\": \"PodList\", \"items\": []}\n```";
        assert_eq!(
            extract_json(raw).unwrap(),
            json!({"kind": "PodList", "items": []})
        );
    }

    #[test]
    fn test_bare_fence_with_whitespace() {
        let raw = "\n  ```\n[1, 2]\n```  \n";
        assert_eq!(extract_json(raw).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_missing_closing_fence() {
        let raw = "```json\n{\"a\": 1}";
        assert_eq!(extract_json(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_single_line_fence() {
        assert_eq!(strip_fence("```json {\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_prose_is_a_generation_error() {
        let err = extract_json("Sure! Here are your pods.").unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_transient());
        assert!(matches!(err, SimError::Generation { .. }));
    }
}
