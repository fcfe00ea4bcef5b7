use serde::{Deserialize, Serialize};

/// Events that drive transfer item state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TransferEvent {
    /// A batch worker begins an attempt
    Start,
    /// The company is (now) a member of the target collection
    Complete,
    /// The attempt failed with an error message
    Fail(String),
    /// The cancellation controller withdrew the item
    Cancel,
    /// The retry coordinator re-queues a failed item
    Retry,
}

impl TransferEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
