// Error types for summary-sync.
// Covers dashboard API failures, cache coordination errors, and configuration problems.

use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Coordinator must be started inside a Tokio runtime")]
    NoRuntime,

    #[error("Cached value for {key} has a different type than requested")]
    TypeMismatch { key: String },

    #[error("Fetch for {key} was cancelled")]
    Cancelled { key: String },

    /// A query failure shared with every observer of the entry.
    #[error(transparent)]
    Shared(Arc<SyncError>),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// HTTP status carried by this error, if it came from an API response.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Http { status, .. } => Some(*status),
            SyncError::Request(err) => err.status().map(|s| s.as_u16()),
            SyncError::Shared(err) => err.status(),
            _ => None,
        }
    }

    /// True when the API answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
