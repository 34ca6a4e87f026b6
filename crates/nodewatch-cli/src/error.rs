use nodewatch::WatchError;
use nodewatch_algod::{AlgodError, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Algod(#[from] AlgodError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<nodewatch::ApiError> for CliError {
    fn from(e: nodewatch::ApiError) -> Self {
        CliError::Watch(e.into())
    }
}
