//! Error types for worklog

use thiserror::Error;

/// Result type alias for worklog operations
pub type Result<T> = std::result::Result<T, WorklogError>;

/// Main error type for worklog
#[derive(Error, Debug)]
pub enum WorklogError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorklogError {
    /// Check if the error means a credential is missing or stale
    pub fn is_auth(&self) -> bool {
        matches!(self, WorklogError::Auth(_))
    }
}
