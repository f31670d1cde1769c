//! Error types for the memory engine
//!
//! Operations fail with one of a small set of classified errors. Validation and
//! transport failures abort the current operation only; nothing partially
//! computed is ever persisted.

use thiserror::Error;

/// Result type for memory engine operations
pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    /// Model output that is empty or not a JSON document, or a stored
    /// body/vector that cannot be decoded
    #[error("validation failed: {0}")]
    Validation(String),

    /// Network failure, timeout, non-success status or an explicit error
    /// reported by the completion/embedding service
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} summary not found: {key}")]
    NotFound { kind: String, key: String },

    #[error("invalid period key for {kind}: {key}")]
    InvalidPeriodKey { kind: String, key: String },

    #[error("unknown scope: {0}")]
    InvalidScope(String),
}

impl MemoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MemoryError::Validation(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        MemoryError::Transport(msg.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, MemoryError::Transport(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, MemoryError::Validation(_))
    }
}

impl From<reqwest::Error> for MemoryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MemoryError::Transport(format!("request timed out: {}", e))
        } else {
            MemoryError::Transport(e.to_string())
        }
    }
}
