use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SqlDelayError>;

#[derive(Debug, Error)]
pub enum SqlDelayError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for SqlDelayError {
    fn from(err: serde_json::Error) -> Self {
        SqlDelayError::ConfigError(format!("invalid JSON configuration: {err}"))
    }
}
