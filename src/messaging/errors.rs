//! # Messaging Error Types

use thiserror::Error;

use crate::error::TransferError;

/// Errors raised at the task queue boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessagingError {
    #[error("Task queue is full: capacity {capacity}")]
    QueueFull { capacity: usize },

    #[error("Task queue is closed")]
    QueueClosed,

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::MessageSerialization {
            message: err.to_string(),
        }
    }
}

impl From<MessagingError> for TransferError {
    fn from(err: MessagingError) -> Self {
        TransferError::MessagingError(err.to_string())
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
