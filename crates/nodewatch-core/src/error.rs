//! Engine error types.

use std::time::Duration;

use crate::api::ApiError;

/// Errors that can occur in the telemetry engine.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Transport or HTTP failure, surfaced verbatim from the node API.
    #[error("node API error: {0}")]
    Api(#[from] ApiError),

    #[error("invalid metrics format")]
    InvalidMetricsFormat,

    #[error("invalid counter value for {key}: {value:?}")]
    InvalidCounterValue { key: String, value: String },

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("no release found for channel: {0}")]
    ReleaseChannelNotFound(String),

    #[error("release lookup failed: {0}")]
    Release(String),

    #[error("invalid account address: {0:?}")]
    InvalidAddress(String),

    #[error("timed out waiting for participation key for {address}")]
    KeyGenerationTimeout { address: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("no catchpoint source for network: {0}")]
    UnknownNetwork(String),

    #[error("node is busy: {0}")]
    NodeBusy(String),

    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    #[error("config error: {0}")]
    Config(String),
}

impl WatchError {
    /// True for errors produced by the node API collaborator.
    pub fn is_api(&self) -> bool {
        matches!(self, WatchError::Api(_))
    }
}

/// Bound a node call by `limit`, mapping an elapsed timer to [`WatchError::Timeout`].
pub(crate) async fn bounded<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, WatchError>
where
    F: std::future::Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(WatchError::from),
        Err(_) => Err(WatchError::Timeout { op, after: limit }),
    }
}
