//! Tolerant extraction of JSON payloads from model output.

use serde_json::Value;

/// Body of the first fenced code block, preferring one tagged `json`.
pub fn fenced_block(text: &str) -> Option<&str> {
    let (start, tag_len) = match text.find("```json") {
        Some(idx) => (idx, "```json".len()),
        None => (text.find("```")?, "```".len()),
    };
    let body_start = start + tag_len;
    let end = text[body_start..].find("```")?;
    let body = text[body_start..body_start + end].trim();
    (!body.is_empty()).then_some(body)
}

/// JSON from a fenced block if one parses, otherwise the whole text.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(block) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str(block) {
            return Some(value);
        }
    }
    serde_json::from_str(text.trim()).ok()
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Text form of a JSON scalar; `None` for null, arrays and objects.
pub fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A list of strings; a lone string counts as a one-item list.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| text_of(Some(item)))
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefers_fenced_json() {
        let text = "Sure!\n```json\n{\"a\": 1}\n```\nanything else";
        assert_eq!(extract_json(text), Some(json!({"a": 1})));
    }

    #[test]
    fn test_untagged_fence_and_raw_json() {
        assert_eq!(extract_json("```\n[1, 2]\n```"), Some(json!([1, 2])));
        assert_eq!(extract_json("  {\"b\": true} "), Some(json!({"b": true})));
        assert_eq!(extract_json("not json at all"), None);
    }

    #[test]
    fn test_unclosed_fence_falls_back_to_raw() {
        assert_eq!(extract_json("```json\n{\"a\": 1}"), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_string_list_shapes() {
        assert_eq!(string_list(Some(&json!(["a", 2, null]))), vec!["a", "2"]);
        assert_eq!(string_list(Some(&json!("solo"))), vec!["solo"]);
        assert!(string_list(Some(&json!({"k": "v"}))).is_empty());
        assert!(string_list(None).is_empty());
    }
}
