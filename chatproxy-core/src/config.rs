use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UpstreamCfg {
    /// Base URL of the provider's Responses API, e.g. https://api.openai.com
    pub base: String,
    /// Name of the environment variable that contains the API key.
    pub api_key_env: String,
    /// Model used when the request carries no override.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Cheaper model used for the best-effort title side task.
    #[serde(default = "default_title_model")]
    pub title_model: String,
}

fn default_model() -> String {
    "gpt-5".to_string()
}
fn default_title_model() -> String {
    "gpt-5-nano".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerCfg {
    /// Listen address, e.g. 127.0.0.1:8787
    pub bind: String,
    /// Environment variable holding the bearer token callers must present.
    /// Missing means the relay accepts every caller (local development).
    #[serde(default)]
    pub auth_token_env: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds for non-streaming calls
    /// (default 60000ms). Streaming calls are not bounded by this timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub upstream: UpstreamCfg,
    pub server: ServerCfg,
    /// HTTP client configuration (timeouts, pooling). Missing in older configs → defaults.
    #[serde(default)]
    pub http: HttpCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::ChatProxyError::from)?;
        let s =
            std::str::from_utf8(&bytes).map_err(|e| crate::error::ChatProxyError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatProxyError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatProxyError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatProxyError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::ChatProxyError::Other(e.into()))
                })?,
        };
        Ok(cfg)
    }
}
