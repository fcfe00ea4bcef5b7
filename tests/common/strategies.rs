//! Proptest strategies for transfer jobs.

use proptest::prelude::*;
use transfer_core::TransferEvent;

/// Distinct company ids, possibly empty
pub fn company_ids_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(1i64..1_000_000, 0..400)
        .prop_map(|ids| ids.into_iter().collect())
}

pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    1usize..150
}

pub fn event_strategy() -> impl Strategy<Value = TransferEvent> {
    prop_oneof![
        Just(TransferEvent::Start),
        Just(TransferEvent::Complete),
        "[a-z ]{1,20}".prop_map(TransferEvent::Fail),
        Just(TransferEvent::Cancel),
        Just(TransferEvent::Retry),
    ]
}
