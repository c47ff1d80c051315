//! The upstream messages API, behind a trait so handlers can be driven by any backend.

use crate::config::BackendConfig;
use crate::error::{ProxyError, Result};
use crate::logging::SharedLogger;
use crate::translate::anthropic_types::{BackendErrorResponse, BackendRequest, BackendResponse, StreamEvent};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

/// Stream of decoded backend events, in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Run a request to completion.
    async fn create(&self, req: &BackendRequest) -> Result<BackendResponse>;

    /// Open a streaming request. Errors before the first event surface here;
    /// errors after it surface as items of the returned stream.
    async fn stream(&self, req: &BackendRequest) -> Result<EventStream>;
}

/// Client for an Anthropic-compatible `/v1/messages` endpoint.
pub struct AnthropicBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    anthropic_version: String,
    logger: SharedLogger,
}

impl AnthropicBackend {
    pub fn new(config: &BackendConfig, api_key: String, logger: SharedLogger) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self::with_client(client, config, api_key, logger))
    }

    pub fn with_client(
        client: reqwest::Client,
        config: &BackendConfig,
        api_key: String,
        logger: SharedLogger,
    ) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            anthropic_version: config.anthropic_version.clone(),
            logger,
        }
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, req: &BackendRequest) -> Result<reqwest::Response> {
        let url = self.url();
        self.logger.info(
            "backend",
            format!(
                "POST {} model={} streaming={}",
                url,
                req.model,
                req.stream.unwrap_or(false)
            ),
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.anthropic_version)
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<BackendErrorResponse>(&body) {
                Ok(err) => format!("{}: {}", err.error.error_type, err.error.message),
                Err(_) => truncate(&body, 500).to_string(),
            };
            self.logger
                .warn("backend", format!("Backend error status={}: {}", status, message));
            return Err(ProxyError::backend(status, message));
        }

        Ok(response)
    }
}

#[async_trait]
impl Backend for AnthropicBackend {
    async fn create(&self, req: &BackendRequest) -> Result<BackendResponse> {
        let response = self.send(req).await?;
        let body = response.text().await?;

        self.logger
            .debug("backend", format!("Response body_len={}", body.len()));

        serde_json::from_str(&body).map_err(ProxyError::from)
    }

    async fn stream(&self, req: &BackendRequest) -> Result<EventStream> {
        let mut req = req.clone();
        req.stream = Some(true);

        let response = self.send(&req).await?;

        let events = response.bytes_stream().eventsource().map(|item| match item {
            Ok(event) => serde_json::from_str::<StreamEvent>(&event.data).map_err(ProxyError::from),
            Err(e) => Err(ProxyError::stream(e.to_string())),
        });

        Ok(Box::pin(events))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
