//! Error types for the transfer engine.
//!
//! Item-level failures never surface through these types: they are recorded on the
//! transfer item itself. `TransferError` is what crosses component boundaries
//! (job-fatal orchestration errors, store outages, invalid requests).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Orchestration error: {0}")]
    OrchestrationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Messaging error: {0}")]
    MessagingError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for TransferError {
    fn from(error: serde_json::Error) -> Self {
        TransferError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(err: sqlx::Error) -> Self {
        TransferError::DatabaseError(err.to_string())
    }
}

pub type TransferResult<T> = std::result::Result<T, TransferError>;
