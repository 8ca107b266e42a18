//! Extraction of embedded actions from advisor replies.
//!
//! The advisor is instructed to wrap machine-readable commands in a code
//! fence opened with the reserved `__SYSTEM_ACTION__` sentinel, one JSON
//! object per fence, e.g.
//! `{"action": "update_field", "field": "budget", "value": "10M"}`.
//!
//! Generative backends do not always follow instructions, so extraction is a
//! two-stage tolerant scan: the reserved fence first, and if that yields
//! nothing, any ordinary ```json fence whose body is an object carrying the
//! `"action"` key. Payloads that fail to parse are dropped silently.
//! Extraction never fails: the worst case is zero actions and the input text
//! trimmed.
//!
//! The visible text has every fence of both forms removed so the raw payload
//! is never shown to the end user.

use super::ACTION_KEY;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Opening sentinel of the reserved fence.
pub const ACTION_FENCE: &str = "```__SYSTEM_ACTION__";

static RESERVED_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```__SYSTEM_ACTION__\s*(\{[\s\S]*?\})\s*```").unwrap());

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*(\{[^`]+\})\s*```").unwrap());

// Strip patterns consume one trailing newline so a fence on its own line
// does not leave a blank hole behind.
static STRIP_RESERVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```__SYSTEM_ACTION__[\s\S]*?```\n?").unwrap());

static STRIP_JSON_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"```json\s*\{[^`]*"action"[^`]*\}\s*```\n?"#).unwrap());

static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Result of scanning one advisor reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The reply with every embedded action removed, safe to display.
    pub visible_text: String,

    /// Action candidates in first-occurrence order. Raw JSON objects that
    /// carry the `"action"` key; shape validation happens at apply time.
    pub actions: Vec<Value>,
}

impl Extraction {
    /// The first action, which by convention is "the" suggested one.
    pub fn suggested(&self) -> Option<&Value> {
        self.actions.first()
    }
}

/// Scan a reply for embedded actions and produce the sanitized display text.
///
/// Pure function of the input; never fails.
pub fn extract(raw_text: &str) -> Extraction {
    let mut actions = collect(&RESERVED_FENCE, raw_text);
    if actions.is_empty() {
        // Fallback: the backend used a generic json fence instead of the
        // reserved one.
        actions = collect(&JSON_FENCE, raw_text);
    }

    Extraction {
        visible_text: clean(raw_text),
        actions,
    }
}

/// Parse every fenced payload matched by `fence` that is a JSON object
/// carrying the action discriminator. Anything else is dropped.
fn collect(fence: &Regex, text: &str) -> Vec<Value> {
    fence
        .captures_iter(text)
        .filter_map(|caps| {
            let payload = caps.get(1)?.as_str().trim();
            let value: Value = serde_json::from_str(payload).ok()?;
            if value.as_object()?.contains_key(ACTION_KEY) {
                Some(value)
            } else {
                None
            }
        })
        .collect()
}

/// Remove every action fence from the reply and tidy the remaining text.
fn clean(raw_text: &str) -> String {
    let cleaned = STRIP_RESERVED.replace_all(raw_text, "");
    let cleaned = STRIP_JSON_ACTION.replace_all(&cleaned, "");
    let cleaned = BLANK_RUNS.replace_all(&cleaned, "\n\n");
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_single_reserved_fence() {
        let raw = "Sure, I'll update it.\n```__SYSTEM_ACTION__\n{\"action\":\"update_field\",\"field\":\"budget\",\"value\":\"10M\"}\n```\nDone!";
        let result = extract(raw);
        assert_eq!(result.visible_text, "Sure, I'll update it.\nDone!");
        assert_eq!(result.actions.len(), 1);
        assert_eq!(
            result.actions[0],
            json!({"action": "update_field", "field": "budget", "value": "10M"})
        );
    }

    #[test]
    fn test_visible_text_contains_no_sentinel() {
        let raw = "First:\n```__SYSTEM_ACTION__\n{\"action\":\"a\"}\n```\nSecond:\n```__SYSTEM_ACTION__\n{\"action\":\"b\"}\n```\nEnd.";
        let result = extract(raw);
        assert!(!result.visible_text.contains("__SYSTEM_ACTION__"));
        assert!(!result.visible_text.contains("```"));
        assert_eq!(result.actions.len(), 2);
    }

    #[test]
    fn test_actions_in_occurrence_order() {
        let raw = "\n```__SYSTEM_ACTION__\n{\"action\":\"first\"}\n```\ntext\n```__SYSTEM_ACTION__\n{\"action\":\"second\"}\n```\n";
        let result = extract(raw);
        assert_eq!(result.suggested().unwrap()["action"], "first");
        assert_eq!(result.actions[1]["action"], "second");
    }

    #[test]
    fn test_fallback_json_fence() {
        let raw = "Applying now.\n```json\n{\"action\": \"update_field\", \"field\": \"title\", \"value\": \"New\"}\n```\n";
        let result = extract(raw);
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0]["field"], "title");
        assert_eq!(result.visible_text, "Applying now.");
    }

    #[test]
    fn test_reserved_fence_wins_over_fallback() {
        // Once the reserved form matches, generic json fences are not
        // re-scanned for candidates (but are still stripped if they carry
        // an action key).
        let raw = "\n```__SYSTEM_ACTION__\n{\"action\":\"one\"}\n```\n```json\n{\"action\":\"two\"}\n```\n";
        let result = extract(raw);
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0]["action"], "one");
        assert!(!result.visible_text.contains("two"));
    }

    #[test]
    fn test_malformed_payload_discarded() {
        let raw = "Oops:\n```__SYSTEM_ACTION__\n{\"action\": \"update_field\",\n```\ntrailing";
        let result = extract(raw);
        assert!(result.actions.is_empty());
        // The broken fence is still stripped from the visible text.
        assert!(!result.visible_text.contains("__SYSTEM_ACTION__"));
    }

    #[test]
    fn test_record_without_discriminator_discarded() {
        let raw = "\n```__SYSTEM_ACTION__\n{\"field\": \"budget\", \"value\": \"10M\"}\n```\n";
        let result = extract(raw);
        assert!(result.actions.is_empty());
    }

    #[test]
    fn test_plain_json_fence_left_visible() {
        // A json fence without an action key is ordinary content: no
        // candidate, and it stays in the visible text.
        let raw = "Example config:\n```json\n{\"port\": 8080}\n```\nThat's it.";
        let result = extract(raw);
        assert!(result.actions.is_empty());
        assert!(result.visible_text.contains("\"port\": 8080"));
    }

    #[test]
    fn test_no_fences_returns_trimmed_input() {
        let raw = "  Just a friendly reply.\n\n";
        let result = extract(raw);
        assert!(result.actions.is_empty());
        assert_eq!(result.visible_text, "Just a friendly reply.");
    }

    #[test]
    fn test_blank_runs_collapsed() {
        let raw = "a\n\n\n\n\nb";
        let result = extract(raw);
        assert_eq!(result.visible_text, "a\n\nb");
    }

    #[test]
    fn test_empty_input() {
        let result = extract("");
        assert!(result.actions.is_empty());
        assert!(result.visible_text.is_empty());
    }
}
