use crate::error::TransferError;
use thiserror::Error;

/// Errors raised while applying transfer item transitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

impl From<StateMachineError> for TransferError {
    fn from(err: StateMachineError) -> Self {
        TransferError::StateTransitionError(format!("{err}"))
    }
}
