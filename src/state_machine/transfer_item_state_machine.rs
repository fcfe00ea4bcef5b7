use chrono::{DateTime, Utc};
use tracing::debug;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::TransferEvent,
    states::TransferItemState,
};
use crate::models::TransferItem;

/// Transition table and side effects for transfer items.
///
/// | from                              | event      | to           |
/// |-----------------------------------|------------|--------------|
/// | pending, processing, cancelled    | `Start`    | processing   |
/// | processing                        | `Complete` | success      |
/// | processing                        | `Fail`     | error        |
/// | pending, processing               | `Cancel`   | cancelled    |
/// | error                             | `Retry`    | pending      |
///
/// `Start` is accepted from `cancelled` because cancellation is advisory: a batch that
/// was already dispatched still completes its items. Every other pair is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferItemStateMachine;

impl TransferItemStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Determine the target state for an event without touching any item
    pub fn determine_target_state(
        &self,
        current_state: TransferItemState,
        event: &TransferEvent,
    ) -> StateMachineResult<TransferItemState> {
        use TransferItemState::*;

        let target = match (current_state, event) {
            (Pending | Processing | Cancelled, TransferEvent::Start) => Processing,

            (Processing, TransferEvent::Complete) => Success,
            (Processing, TransferEvent::Fail(_)) => Error,

            (Pending | Processing, TransferEvent::Cancel) => Cancelled,

            (Error, TransferEvent::Retry) => Pending,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Check whether an event is accepted from the given state
    pub fn can_transition(&self, current_state: TransferItemState, event: &TransferEvent) -> bool {
        self.determine_target_state(current_state, event).is_ok()
    }

    /// Apply an event to an in-memory item.
    ///
    /// On `Start` the attempt is stamped (`last_attempt_at`, `attempt_count`).
    /// `error_message` is only ever set alongside `error`, and `is_cancelled` is
    /// recomputed from the new status. A rejected event leaves the item untouched.
    pub fn apply(
        &self,
        item: &mut TransferItem,
        event: TransferEvent,
        now: DateTime<Utc>,
    ) -> StateMachineResult<TransferItemState> {
        let from_state = item.status;
        let target_state = self.determine_target_state(from_state, &event)?;

        if event == TransferEvent::Start {
            item.last_attempt_at = Some(now);
            item.attempt_count += 1;
        }

        item.error_message = event.error_message().map(str::to_string);
        item.status = target_state;
        item.is_cancelled = target_state == TransferItemState::Cancelled;

        debug!(
            item_id = %item.id,
            company_id = item.company_id,
            from = %from_state,
            to = %target_state,
            event = event.event_type(),
            "Transfer item transition applied"
        );

        Ok(target_state)
    }
}
