//! Algod connection settings from environment variables.

use std::time::Duration;
use url::Url;

const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid ALGOD_ENDPOINT {value:?}: {source}")]
    InvalidEndpoint {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("ALGOD_ENDPOINT must use http or https, got {0}")]
    UnsupportedScheme(String),

    #[error("invalid NODEWATCH_HTTP_TIMEOUT_SECS: {0:?}")]
    InvalidTimeout(String),
}

#[derive(Clone)]
pub struct AlgodConfig {
    /// Node REST base URL (env: ALGOD_ENDPOINT, default: http://localhost:8080).
    pub endpoint: Url,
    /// Sent as `X-Algo-API-Token` (env: ALGOD_TOKEN). Admin token needed for key calls.
    pub token: Option<String>,
    /// Per-request limit enforced by the HTTP client (env: NODEWATCH_HTTP_TIMEOUT_SECS, default: 30).
    pub http_timeout: Duration,
}

impl std::fmt::Debug for AlgodConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgodConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl AlgodConfig {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            token: token.filter(|t| !t.is_empty()),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint =
            std::env::var("ALGOD_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let mut config = Self::new(&endpoint, std::env::var("ALGOD_TOKEN").ok())?;

        if let Ok(raw) = std::env::var("NODEWATCH_HTTP_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidTimeout(raw))?;
            config.http_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn parse_endpoint(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidEndpoint {
        value: value.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}
