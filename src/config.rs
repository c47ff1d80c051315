use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used when a request does not name one.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-3-sonnet-20240229".to_string()
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_key: None,
            anthropic_version: default_anthropic_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backend: BackendConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Load config from a TOML file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in &config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        tracing::debug!("No config file found, using defaults and environment");
        Ok(Self::default())
    }

    /// Overlay `MODEL_NAME`, `BASE_URL`, `HOST` and `PORT` from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay environment-style variables supplied by `lookup`.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = lookup("MODEL_NAME") {
            self.backend.model = model;
        }
        if let Some(url) = lookup("BASE_URL") {
            self.backend.base_url = url;
        }
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ProxyError::config(format!("PORT must be a port number, got '{port}'")))?;
        }
        if let Some(key) = lookup(self.backend.api_key_env.as_str()) {
            self.backend.api_key = Some(key);
        }

        Ok(self)
    }

    /// The API key: explicit config value, else the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(ref key) = self.backend.api_key {
            return Ok(key.clone());
        }

        std::env::var(&self.backend.api_key_env).map_err(|_| {
            ProxyError::config(format!(
                "Environment variable '{}' not set. Set it with your Anthropic API key.",
                self.backend.api_key_env
            ))
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Candidate config file locations, highest priority first.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("anthropic-proxy.toml"));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("anthropic-proxy").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("anthropic-proxy").join("config.toml"));
        paths.push(home.join(".anthropic-proxy.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[backend]
model = "claude-3-haiku-20240307"
api_key_env = "ANTHROPIC_API_KEY"
timeout_secs = 60
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.backend.model, "claude-3-haiku-20240307");
        assert_eq!(config.backend.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.backend.base_url, "https://api.anthropic.com");
        assert_eq!(config.backend.timeout_secs, 60);
    }

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.backend.model, "claude-3-sonnet-20240229");
        assert_eq!(config.backend.anthropic_version, "2023-06-01");
    }

    #[test]
    fn test_env_overrides() {
        let config = ProxyConfig::default()
            .with_env_from(env(&[
                ("API_KEY", "sk-ant-test"),
                ("MODEL_NAME", "claude-3-opus-20240229"),
                ("BASE_URL", "http://localhost:9000"),
                ("HOST", "127.0.0.1"),
                ("PORT", "3000"),
            ]))
            .unwrap();

        assert_eq!(config.backend.model, "claude-3-opus-20240229");
        assert_eq!(config.backend.base_url, "http://localhost:9000");
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.resolve_api_key().unwrap(), "sk-ant-test");
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let config = ProxyConfig::default()
            .with_env_from(env(&[("MODEL_NAME", "  "), ("PORT", "")]))
            .unwrap();
        assert_eq!(config.backend.model, "claude-3-sonnet-20240229");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let err = ProxyConfig::default()
            .with_env_from(env(&[("PORT", "eighty")]))
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = ProxyConfig::default();
        config.backend.api_key_env = "ANTHROPIC_PROXY_TEST_UNSET_KEY".to_string();
        let err = config.resolve_api_key().unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_PROXY_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = ProxyConfig::default();
        config.backend.api_key = Some("sk-ant-secret".to_string());
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("sk-ant-secret"));
    }
}
