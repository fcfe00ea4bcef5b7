// State machine module for transfer item lifecycle
//
// A closed state enum, the events that drive it, and an explicit transition table.
// Transitions are applied to in-memory items; the store persists the result.

pub mod errors;
pub mod events;
pub mod states;
pub mod transfer_item_state_machine;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::TransferEvent;
pub use states::TransferItemState;
pub use transfer_item_state_machine::TransferItemStateMachine;
