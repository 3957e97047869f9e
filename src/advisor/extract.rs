//! Extraction and validation of the model's JSON recommendation.
//!
//! Models wrap their JSON in prose, code fences, or commentary. We scan the
//! raw completion for the first balanced top-level JSON object and then parse
//! it strictly into [`Recommendation`]: required fields must be present and
//! correctly typed, while extra keys the model volunteers are ignored.

use serde::{Deserialize, Serialize};

use super::AdvisorError;

/// A validated scheduling recommendation from the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Recommended scheduling time (ISO 8601 string as produced by the model).
    pub recommended_time: String,
    /// Brief explanation of why this time was chosen.
    pub reasoning: String,
    /// Titles of existing tasks that might conflict.
    #[serde(default)]
    pub conflicting_tasks: Vec<String>,
}

/// Find the first balanced `{ ... }` object in `text`.
///
/// Brace depth is tracked outside of string literals only, so braces inside
/// JSON strings (including escaped quotes) do not confuse the scan. Returns
/// `None` when no balanced object exists.
pub fn first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and strictly parse the recommendation embedded in a completion.
pub fn parse_recommendation(completion: &str) -> Result<Recommendation, AdvisorError> {
    let object = first_json_object(completion).ok_or(AdvisorError::MissingJson)?;
    serde_json::from_str(object).map_err(|e| AdvisorError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn extracts_object_embedded_in_prose() {
        let completion = r#"Sure! Based on your schedule, here is my suggestion:

{"recommendedTime": "2026-09-01T09:00:00Z", "reasoning": "Morning slot is free", "conflictingTasks": []}

Let me know if you'd like an alternative."#;
        let rec = parse_recommendation(completion).unwrap();
        assert_eq!(rec.recommended_time, "2026-09-01T09:00:00Z");
        assert_eq!(rec.reasoning, "Morning slot is free");
        assert!(rec.conflicting_tasks.is_empty());
    }

    #[test]
    fn extracts_object_from_code_fence() {
        let completion = "```json\n{\"recommendedTime\": \"2026-09-01T14:00:00Z\", \"reasoning\": \"ok\", \"conflictingTasks\": [\"Standup\"]}\n```";
        let rec = parse_recommendation(completion).unwrap();
        assert_eq!(rec.conflicting_tasks, vec!["Standup"]);
    }

    #[test]
    fn handles_nested_braces() {
        let text = r#"prefix {"a": {"b": 1}, "c": 2} suffix"#;
        assert_eq!(first_json_object(text), Some(r#"{"a": {"b": 1}, "c": 2}"#));
    }

    #[test]
    fn braces_inside_strings_do_not_terminate() {
        let text = r#"{"reasoning": "use {curly} braces \" safely", "recommendedTime": "t", "conflictingTasks": []}"#;
        let found = first_json_object(text).unwrap();
        assert_eq!(found, text);
        assert!(parse_recommendation(text).is_ok());
    }

    #[test]
    fn no_json_is_missing_json() {
        let err = parse_recommendation("I cannot help with that.").unwrap_err();
        assert!(matches!(err, AdvisorError::MissingJson));
        assert!(first_json_object("no braces here").is_none());
        assert!(first_json_object("{ unbalanced").is_none());
    }

    #[test]
    fn malformed_shape_is_rejected() {
        // Wrong type for conflictingTasks.
        let bad = r#"{"recommendedTime": "t", "reasoning": "r", "conflictingTasks": "Standup"}"#;
        assert!(matches!(
            parse_recommendation(bad),
            Err(AdvisorError::Parse(_))
        ));

        // Missing required field.
        let bad = r#"{"reasoning": "r", "conflictingTasks": []}"#;
        assert!(matches!(
            parse_recommendation(bad),
            Err(AdvisorError::Parse(_))
        ));
    }

    #[test]
    fn extra_keys_are_tolerated() {
        let verbose = r#"{"recommendedTime": "t", "reasoning": "r", "conflictingTasks": [], "confidence": 0.9}"#;
        let rec = parse_recommendation(verbose).unwrap();
        assert_eq!(rec.recommended_time, "t");
        assert_eq!(rec.reasoning, "r");
    }

    #[test]
    fn conflicting_tasks_defaults_to_empty() {
        let minimal = r#"{"recommendedTime": "t", "reasoning": "r"}"#;
        let rec = parse_recommendation(minimal).unwrap();
        assert!(rec.conflicting_tasks.is_empty());
    }
}
