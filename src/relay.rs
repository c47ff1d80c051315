//! Relay a backend event stream to the client as `chat.completion.chunk` frames.
//!
//! Frame protocol:
//!   1. exactly one role chunk before any content chunk
//!   2. one content chunk per text delta, in arrival order, never coalesced
//!   3. on `message_stop` (or the end of the event stream) one finish chunk, then `[DONE]`
//!   4. on any failure a single `{"error": "<kind>: <message>"}` frame and nothing after it

use crate::error::{ProxyError, Result};
use crate::logging::SharedLogger;
use crate::translate::anthropic_types::StreamEvent;
use crate::translate::openai_types::ChatChunk;
use crate::translate::streaming::StreamTranslator;

use futures::stream::{self, Stream, StreamExt};

pub const DONE_MARKER: &str = "[DONE]";

/// One `data:` frame of the outbound event stream.
#[derive(Debug, Clone)]
pub enum RelayFrame {
    Chunk(ChatChunk),
    Error(String),
    Done,
}

impl RelayFrame {
    pub fn error(err: &ProxyError) -> Self {
        RelayFrame::Error(err.describe())
    }

    /// The payload that follows `data: ` on the wire.
    pub fn data(&self) -> String {
        match self {
            RelayFrame::Chunk(chunk) => match serde_json::to_string(chunk) {
                Ok(data) => data,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize chunk");
                    serde_json::json!({ "error": format!("DecodeError: {e}") }).to_string()
                }
            },
            RelayFrame::Error(message) => serde_json::json!({ "error": message }).to_string(),
            RelayFrame::Done => DONE_MARKER.to_string(),
        }
    }
}

/// Drive `events` to completion, yielding client frames as each event arrives.
///
/// The backend stream is pulled one event at a time and dropped as soon as the
/// relay finishes, fails, or is itself dropped by a disconnecting client.
pub fn relay_events<S>(
    events: S,
    translator: StreamTranslator,
    logger: SharedLogger,
) -> impl Stream<Item = RelayFrame> + Send + 'static
where
    S: Stream<Item = Result<StreamEvent>> + Send + 'static,
{
    async_stream::stream! {
        let mut events = Box::pin(events);
        let mut role_sent = false;
        let mut fragments = 0usize;

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(StreamEvent::Error { error }) => {
                    let err = ProxyError::upstream(error.error_type, error.message);
                    logger.error("relay", format!("Backend error event: {}", err.describe()));
                    yield RelayFrame::error(&err);
                    return;
                }
                Ok(event) => event,
                Err(err) => {
                    logger.error("relay", format!("Backend stream failed: {}", err.describe()));
                    yield RelayFrame::error(&err);
                    return;
                }
            };

            tracing::trace!(event = event.event_name(), "backend stream event");

            let Some(chunk) = translator.translate(&event) else {
                continue;
            };

            if chunk.is_role() {
                if !role_sent {
                    role_sent = true;
                    yield RelayFrame::Chunk(chunk);
                }
                continue;
            }

            if !role_sent {
                role_sent = true;
                yield RelayFrame::Chunk(translator.role_chunk());
            }

            if chunk.is_finish() {
                break;
            }

            fragments += 1;
            yield RelayFrame::Chunk(chunk);
        }

        drop(events);

        if !role_sent {
            yield RelayFrame::Chunk(translator.role_chunk());
        }
        yield RelayFrame::Chunk(translator.finish_chunk());
        yield RelayFrame::Done;

        logger.info(
            "relay",
            format!("Stream {} completed: {} fragments", translator.id(), fragments),
        );
    }
}

/// The whole output of a stream whose backend call failed before any event arrived.
pub fn open_failure(err: ProxyError) -> impl Stream<Item = RelayFrame> + Send + 'static {
    stream::once(async move { RelayFrame::error(&err) })
}
