//! Error types for the proxy.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Backend returned status {status}: {message}")]
    Backend { status: u16, message: String },

    /// An `error` event delivered inside an otherwise healthy event stream.
    #[error("{error_type}: {message}")]
    Upstream { error_type: String, message: String },

    #[error("Stream error: {message}")]
    Stream { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn backend(status: u16, msg: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: msg.into(),
        }
    }

    pub fn upstream(error_type: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Upstream {
            error_type: error_type.into(),
            message: msg.into(),
        }
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream {
            message: msg.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Stable name of the failure class, surfaced to clients as `<kind>: <message>`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } | Self::Toml(_) => "ConfigError",
            Self::Backend { .. } => "BackendStatusError",
            Self::Upstream { .. } => "UpstreamError",
            Self::Stream { .. } => "StreamError",
            Self::Http(_) => "ConnectionError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "DecodeError",
            Self::Other(_) => "ProxyError",
        }
    }

    pub fn describe(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_prefixes_kind() {
        let err = ProxyError::backend(401, "authentication_error: invalid x-api-key");
        assert_eq!(
            err.describe(),
            "BackendStatusError: Backend returned status 401: authentication_error: invalid x-api-key"
        );
    }

    #[test]
    fn test_upstream_error_display() {
        let err = ProxyError::upstream("overloaded_error", "Overloaded");
        assert_eq!(err.kind(), "UpstreamError");
        assert_eq!(err.to_string(), "overloaded_error: Overloaded");
    }

    #[test]
    fn test_json_error_is_decode_error() {
        let err: ProxyError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "DecodeError");
        assert!(err.describe().starts_with("DecodeError: JSON error:"));
    }
}
