//! Per-stream translation of Anthropic stream events into `OpenAI` chunks.
//!
//! The [`StreamTranslator`] fixes the completion id, model name and creation
//! time when the stream opens; every chunk it produces reuses them. It keeps no
//! other state: ordering and termination are the relay's job.

use super::anthropic_types::{BlockDelta, StreamEvent};
use super::openai_types::{ChatChunk, ChunkChoice, ChunkDelta};
use super::response::{completion_id, unix_now};

/// Translates Anthropic stream events into `chat.completion.chunk` objects.
///
/// Usage:
///   let translator = StreamTranslator::new("claude-3-sonnet-20240229");
///   for event in events {
///       if let Some(chunk) = translator.translate(&event) {
///           // send chunk as SSE
///       }
///   }
#[derive(Debug, Clone)]
pub struct StreamTranslator {
    id: String,
    model: String,
    created: i64,
}

impl StreamTranslator {
    pub fn new(model: &str) -> Self {
        let created = unix_now();
        Self {
            id: completion_id(created),
            model: model.to_string(),
            created,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Translate one backend event. Events without an OpenAI counterpart yield `None`.
    pub fn translate(&self, event: &StreamEvent) -> Option<ChatChunk> {
        match event {
            StreamEvent::MessageStart { .. } => Some(self.role_chunk()),
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
                ..
            } => Some(self.content_chunk(text)),
            StreamEvent::MessageStop => Some(self.finish_chunk()),
            StreamEvent::ContentBlockDelta { .. } | StreamEvent::Error { .. } | StreamEvent::Other => {
                None
            }
        }
    }

    pub fn role_chunk(&self) -> ChatChunk {
        self.chunk(
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: None,
            },
            None,
        )
    }

    pub fn content_chunk(&self, text: &str) -> ChatChunk {
        self.chunk(
            ChunkDelta {
                role: None,
                content: Some(text.to_string()),
            },
            None,
        )
    }

    pub fn finish_chunk(&self) -> ChatChunk {
        self.chunk(ChunkDelta::default(), Some("stop".to_string()))
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<String>) -> ChatChunk {
        ChatChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::anthropic_types::BackendErrorBody;
    use serde_json::json;

    #[test]
    fn test_message_start_gives_role_chunk() {
        let translator = StreamTranslator::new("test-model");
        let chunk = translator
            .translate(&StreamEvent::MessageStart {
                message: json!({"id": "msg_1"}),
            })
            .unwrap();

        assert_eq!(chunk.object, "chat.completion.chunk");
        assert_eq!(chunk.model, "test-model");
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunk.choices[0].delta.content, None);
        assert_eq!(chunk.choices[0].finish_reason, None);
    }

    #[test]
    fn test_text_delta_gives_content_chunk() {
        let translator = StreamTranslator::new("test-model");
        let chunk = translator.translate(&StreamEvent::text_delta("Hi")).unwrap();

        assert_eq!(chunk.content(), Some("Hi"));
        assert_eq!(chunk.choices[0].delta.role, None);
        assert!(!chunk.is_finish());
    }

    #[test]
    fn test_message_stop_gives_finish_chunk() {
        let translator = StreamTranslator::new("test-model");
        let chunk = translator.translate(&StreamEvent::MessageStop).unwrap();

        assert_eq!(chunk.choices[0].delta, ChunkDelta::default());
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_other_events_give_nothing() {
        let translator = StreamTranslator::new("test-model");
        let non_text_delta = StreamEvent::ContentBlockDelta {
            index: 1,
            delta: BlockDelta::Other,
        };
        let error = StreamEvent::Error {
            error: BackendErrorBody {
                error_type: "overloaded_error".to_string(),
                message: "Overloaded".to_string(),
            },
        };

        assert!(translator.translate(&StreamEvent::Other).is_none());
        assert!(translator.translate(&non_text_delta).is_none());
        assert!(translator.translate(&error).is_none());
    }

    #[test]
    fn test_all_chunks_share_id_and_created() {
        let translator = StreamTranslator::new("test-model");
        let chunks = [
            translator.role_chunk(),
            translator.content_chunk("a"),
            translator.finish_chunk(),
        ];

        assert!(translator.id().starts_with("chatcmpl-"));
        for chunk in &chunks {
            assert_eq!(chunk.id, translator.id());
            assert_eq!(chunk.created, chunks[0].created);
            assert_eq!(chunk.model, translator.model());
        }
    }
}
