//! Translate `OpenAI` Chat Completions requests into Anthropic Messages requests.
//!
//! System-role messages are dropped (the messages API keeps system instructions
//! outside the message list), every remaining message becomes a list of text
//! blocks, and image parts are replaced by a textual reference to their URL.

use super::anthropic_types::{BackendContentBlock, BackendMessage, BackendRequest, BackendRole};
use super::openai_types::{ChatMessage, ChatRequest, ContentPart, MessageContent, Role};

pub const DEFAULT_MAX_TOKENS: u64 = 4096;

/// Translate a Chat Completions request into a Messages API request.
/// Pure function: `default_model` fills in when the caller names no model.
pub fn chat_to_backend(req: &ChatRequest, default_model: &str) -> BackendRequest {
    let messages = req.messages.iter().filter_map(translate_message).collect();

    BackendRequest {
        model: effective_model(req, default_model),
        max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        messages,
        // A system-role message is never promoted into this field.
        system: req.system.clone(),
        temperature: req.temperature,
        top_p: req.top_p,
        stream: req.stream,
    }
}

/// The model a request is served with: the caller's choice, else the default.
pub fn effective_model(req: &ChatRequest, default_model: &str) -> String {
    req.model
        .clone()
        .unwrap_or_else(|| default_model.to_string())
}

fn translate_message(msg: &ChatMessage) -> Option<BackendMessage> {
    let role = match msg.role {
        Role::System => return None,
        Role::User => BackendRole::User,
        Role::Assistant => BackendRole::Assistant,
    };

    Some(BackendMessage {
        role,
        content: translate_content(&msg.content),
    })
}

fn translate_content(content: &MessageContent) -> Vec<BackendContentBlock> {
    let mut blocks = match content {
        MessageContent::Text(text) => vec![BackendContentBlock::text(text.clone())],
        MessageContent::Parts(parts) => parts.iter().filter_map(translate_part).collect(),
        MessageContent::Other(value) => vec![BackendContentBlock::text(stringify(value))],
    };

    // The messages API rejects empty content lists
    if blocks.is_empty() {
        blocks.push(BackendContentBlock::text(""));
    }

    blocks
}

fn translate_part(part: &ContentPart) -> Option<BackendContentBlock> {
    match part {
        ContentPart::Text { text } => Some(BackendContentBlock::text(text.clone())),
        ContentPart::ImageUrl { image_url } => Some(BackendContentBlock::text(format!(
            "[Image: {}]",
            image_url.url()
        ))),
        ContentPart::Unknown => None,
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";

    fn parse(value: serde_json::Value) -> ChatRequest {
        serde_json::from_value(value).unwrap()
    }

    fn only_text(msg: &BackendMessage) -> Vec<&str> {
        msg.content
            .iter()
            .map(|b| match b {
                BackendContentBlock::Text { text } => text.as_str(),
            })
            .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let req = parse(json!({"messages": [{"role": "user", "content": "hi"}]}));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(out.model, DEFAULT_MODEL);
        assert_eq!(out.max_tokens, 4096);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].role, BackendRole::User);
        assert_eq!(only_text(&out.messages[0]), vec!["hi"]);
    }

    #[test]
    fn test_caller_values_pass_through() {
        let req = parse(json!({
            "model": "claude-3-haiku-20240307",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 16,
            "temperature": 0.2,
            "top_p": 0.9,
            "stream": true
        }));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(out.model, "claude-3-haiku-20240307");
        assert_eq!(out.max_tokens, 16);
        assert_eq!(out.temperature, Some(0.2));
        assert_eq!(out.top_p, Some(0.9));
        assert_eq!(out.stream, Some(true));
    }

    #[test]
    fn test_unspecified_optionals_are_absent_not_null() {
        let req = parse(json!({"messages": [{"role": "user", "content": "hi"}]}));
        let value = serde_json::to_value(chat_to_backend(&req, DEFAULT_MODEL)).unwrap();
        let obj = value.as_object().unwrap();

        assert!(!obj.contains_key("temperature"));
        assert!(!obj.contains_key("top_p"));
        assert!(!obj.contains_key("stream"));
        assert!(!obj.contains_key("system"));
    }

    #[test]
    fn test_system_messages_dropped_not_promoted() {
        let req = parse(json!({
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ]
        }));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(out.system, None);
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].role, BackendRole::User);
        assert_eq!(out.messages[1].role, BackendRole::Assistant);
    }

    #[test]
    fn test_explicit_system_field_wins() {
        let req = parse(json!({
            "system": "you are a pirate",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"}
            ]
        }));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(out.system.as_deref(), Some("you are a pirate"));
        assert_eq!(out.messages.len(), 1);
    }

    #[test]
    fn test_image_part_becomes_text_reference() {
        let req = parse(json!({
            "messages": [{
                "role": "user",
                "content": [{"type": "image_url", "image_url": {"url": "http://x/y.png"}}]
            }]
        }));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(only_text(&out.messages[0]), vec!["[Image: http://x/y.png]"]);
    }

    #[test]
    fn test_mixed_parts_keep_order_and_drop_unknown() {
        let req = parse(json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "input_audio", "input_audio": {"data": "AAAA", "format": "wav"}},
                    {"type": "image_url", "image_url": {"url": "http://x/y.png", "detail": "low"}}
                ]
            }]
        }));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(
            only_text(&out.messages[0]),
            vec!["what is this?", "[Image: http://x/y.png]"]
        );
    }

    #[test]
    fn test_empty_parts_yield_single_empty_block() {
        for content in [json!([]), json!([{"type": "file", "file": {"id": "f1"}}])] {
            let req = parse(json!({"messages": [{"role": "user", "content": content}]}));
            let out = chat_to_backend(&req, DEFAULT_MODEL);
            assert_eq!(only_text(&out.messages[0]), vec![""]);
        }
    }

    #[test]
    fn test_untyped_part_is_dropped_not_stringified() {
        let req = parse(json!({
            "messages": [{
                "role": "user",
                "content": [{"type": "text", "text": "hi"}, {"note": "no type tag"}]
            }]
        }));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(only_text(&out.messages[0]), vec!["hi"]);
    }

    #[test]
    fn test_null_text_part_reads_as_empty() {
        let req = parse(json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "image_url", "image_url": {"url": "http://x/y.png"}},
                    {"type": "text", "text": null}
                ]
            }]
        }));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(only_text(&out.messages[0]), vec!["[Image: http://x/y.png]", ""]);
    }

    #[test]
    fn test_other_content_is_stringified() {
        let req = parse(json!({
            "messages": [
                {"role": "user", "content": 42},
                {"role": "assistant", "content": null},
                {"role": "user", "content": {"k": "v"}}
            ]
        }));
        let out = chat_to_backend(&req, DEFAULT_MODEL);

        assert_eq!(only_text(&out.messages[0]), vec!["42"]);
        assert_eq!(only_text(&out.messages[1]), vec![""]);
        assert_eq!(only_text(&out.messages[2]), vec![r#"{"k":"v"}"#]);
    }
}
