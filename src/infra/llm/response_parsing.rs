use serde_json::Value;

const MAX_ERROR_MESSAGE_LEN: usize = 256;

pub(crate) fn truncate_message(body: &str) -> String {
    let compact = body.trim().replace('\n', " ");
    compact.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}

/// Keeps the text as produced; only all-whitespace text counts as empty.
pub(crate) fn non_blank(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

pub(crate) fn extract_message_content(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => non_blank(text),
        Value::Array(parts) => {
            let joined = parts
                .iter()
                .filter_map(extract_content_part_text)
                .collect::<String>();
            non_blank(&joined)
        }
        _ => None,
    }
}

fn extract_content_part_text(part: &Value) -> Option<String> {
    match part {
        Value::String(text) => Some(text.to_string()),
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_message_content, non_blank, truncate_message};

    #[test]
    fn truncate_message_compacts_newlines_and_limits_length() {
        let input = "line-1\nline-2";
        let truncated = truncate_message(input);

        assert_eq!(truncated, "line-1 line-2");

        let long = "x".repeat(512);
        let truncated = truncate_message(&long);
        assert_eq!(truncated.len(), 256);
    }

    #[test]
    fn non_blank_preserves_surrounding_whitespace() {
        assert_eq!(non_blank(" hi\n"), Some(" hi\n".to_string()));
        assert_eq!(non_blank(" \n "), None);
    }

    #[test]
    fn extract_message_content_joins_text_parts() {
        let content = json!([
            { "type": "text", "text": "Hello, " },
            "world",
            { "type": "image", "url": "ignored" }
        ]);

        assert_eq!(
            extract_message_content(&content),
            Some("Hello, world".to_string())
        );
        assert_eq!(extract_message_content(&json!("")), None);
        assert_eq!(extract_message_content(&json!(42)), None);
    }
}
