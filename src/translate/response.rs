//! Translate Anthropic Messages responses into `OpenAI` Chat Completion responses.
//!
//! Only the first text block is surfaced. Stop reasons are folded into the two
//! finish reasons chat clients act on, `stop` and `length`.

use super::anthropic_types::{BackendResponse, ResponseBlock};
use super::openai_types::{ChatResponse, ChatUsage, Choice, ChoiceMessage};

/// Translate a Messages API response into a Chat Completion response.
/// Pure apart from the clock: `model` is what the request was served with.
pub fn backend_to_chat(resp: &BackendResponse, model: &str) -> ChatResponse {
    let created = unix_now();

    // Only the first text block is surfaced; tool_use and friends are not translated.
    let content = resp
        .content
        .iter()
        .find_map(|block| match block {
            ResponseBlock::Text { text } => Some(text.clone()),
            ResponseBlock::Other => None,
        })
        .unwrap_or_default();

    let finish_reason = map_stop_reason(resp.stop_reason.as_deref().unwrap_or("end_turn"));

    let usage = resp
        .usage
        .map_or_else(ChatUsage::default, |u| {
            ChatUsage::new(u.input_tokens, u.output_tokens)
        });

    let id = resp
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| completion_id(created));

    ChatResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: Some(finish_reason.to_string()),
        }],
        usage,
    }
}

/// Map Anthropic stop_reason to OpenAI finish_reason. Unknown reasons become "stop".
pub fn map_stop_reason(reason: &str) -> &'static str {
    match reason {
        "max_tokens" => "length",
        "end_turn" | "stop_sequence" => "stop",
        _ => "stop",
    }
}

pub(crate) fn completion_id(created: i64) -> String {
    format!("chatcmpl-{created}")
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
