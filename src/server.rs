use crate::backend::Backend;
use crate::config::ProxyConfig;
use crate::logging::{LogLevel, SharedLogger};
use crate::relay::{self, RelayFrame};
use crate::translate::anthropic_types::BackendRequest;
use crate::translate::openai_types::{ChatRequest, ErrorResponse};
use crate::translate::request::{chat_to_backend, effective_model};
use crate::translate::response::backend_to_chat;
use crate::translate::streaming::StreamTranslator;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Creation time reported for the single advertised model.
const MODEL_CREATED: i64 = 1_700_000_000;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub backend: Arc<dyn Backend>,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/health", get(handle_health))
        .route("/v1/models", get(handle_models))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            state
                .logger
                .error("server", format!("Failed to parse request: {}", e));
            let err = ErrorResponse::invalid_request(format!("Invalid request body: {}", e));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    let model = effective_model(&req, &state.config.backend.model);
    let backend_req = chat_to_backend(&req, &state.config.backend.model);
    let is_streaming = req.stream.unwrap_or(false);

    state.logger.log_with_context(
        LogLevel::Info,
        "server",
        format!("Request: model={} streaming={}", model, is_streaming),
        serde_json::json!({
            "messages": backend_req.messages.len(),
            "dropped_system_messages": req.messages.len() - backend_req.messages.len(),
            "prompt_chars": backend_req
                .messages
                .iter()
                .map(|m| m.flattened_text().len())
                .sum::<usize>(),
            "max_tokens": backend_req.max_tokens,
        }),
    );

    if is_streaming {
        handle_streaming(state, backend_req, model).await
    } else {
        handle_non_streaming(state, backend_req, model).await
    }
}

async fn handle_non_streaming(
    state: Arc<AppState>,
    backend_req: BackendRequest,
    model: String,
) -> Response {
    match state.backend.create(&backend_req).await {
        Ok(resp) => {
            let chat = backend_to_chat(&resp, &model);
            state.logger.info(
                "server",
                format!(
                    "Completed: prompt={} completion={} tokens",
                    chat.usage.prompt_tokens, chat.usage.completion_tokens
                ),
            );
            Json(chat).into_response()
        }
        Err(e) => {
            state
                .logger
                .error("server", format!("Backend error: {}", e.describe()));
            let err = ErrorResponse::api_error(format!("Backend error: {}", e.describe()));
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response()
        }
    }
}

async fn handle_streaming(
    state: Arc<AppState>,
    backend_req: BackendRequest,
    model: String,
) -> Response {
    // Once we answer 200 with an event stream, failures can only be reported in-band.
    let frames = match state.backend.stream(&backend_req).await {
        Ok(events) => relay::relay_events(
            events,
            StreamTranslator::new(&model),
            state.logger.clone(),
        )
        .boxed(),
        Err(e) => {
            state
                .logger
                .error("server", format!("Streaming setup error: {}", e.describe()));
            relay::open_failure(e).boxed()
        }
    };

    Sse::new(sse_events(frames))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn sse_events(
    frames: impl Stream<Item = RelayFrame> + Send + 'static,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> + Send + 'static {
    frames.map(|frame| Ok(Event::default().data(frame.data())))
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Anthropic Proxy Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/v1/chat/completions",
            "health": "/health",
            "models": "/v1/models",
        },
    }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "object": "list",
        "data": [{
            "id": state.config.backend.model,
            "object": "model",
            "created": MODEL_CREATED,
            "owned_by": "anthropic-proxy",
        }],
    }))
}
