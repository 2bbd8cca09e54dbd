//! Error types for quietly-core

use thiserror::Error;

/// Main error type for the quietly-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Illegal session transition (e.g. pausing an already-paused session)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Rejected input (negative pages, end page before start page, bad goal target)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record the caller referred to was not supplied
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether the error can be shown to the user as form validation.
    ///
    /// Engine errors are always recoverable by re-prompting; storage errors are not.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidState(_) | Error::InvalidInput(_) | Error::NotFound { .. }
        )
    }
}

/// Result type alias for quietly-core
pub type Result<T> = std::result::Result<T, Error>;
