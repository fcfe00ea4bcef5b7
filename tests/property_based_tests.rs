mod common;

use chrono::Utc;
use common::pending_items;
use common::strategies::*;
use proptest::prelude::*;
use transfer_core::orchestration::{partition_into_batches, BatchStatus};
use transfer_core::{TransferItemState, TransferItemStateMachine};
use uuid::Uuid;

proptest! {
    /// Property: N items with batch size B give ceil(N/B) gap-free batches covering every item once
    #[test]
    fn partition_covers_items_in_order(
        company_ids in company_ids_strategy(),
        batch_size in batch_size_strategy(),
    ) {
        let job_id = Uuid::new_v4();
        let items = pending_items(job_id, Uuid::new_v4(), company_ids.clone());

        let batches = partition_into_batches(job_id, &items, batch_size).unwrap();

        prop_assert_eq!(batches.len(), company_ids.len().div_ceil(batch_size));
        for (index, batch) in batches.iter().enumerate() {
            prop_assert_eq!(batch.batch_number as usize, index + 1);
            prop_assert!(!batch.company_ids.is_empty());
            prop_assert!(batch.company_ids.len() <= batch_size);
        }
        let flattened: Vec<i64> = batches.into_iter().flat_map(|b| b.company_ids).collect();
        prop_assert_eq!(flattened, company_ids);
    }

    /// Property: classification agrees with the success and error tallies
    #[test]
    fn batch_classification_matches_counts(success in 0usize..50, errors in 0usize..50) {
        let status = BatchStatus::classify(success, errors);
        match status {
            BatchStatus::Success => prop_assert_eq!(errors, 0),
            BatchStatus::PartialSuccess => prop_assert!(success > 0 && errors > 0),
            BatchStatus::Error => prop_assert!(success == 0 && errors > 0),
        }
    }

    /// Property: any event sequence keeps the item's invariants
    #[test]
    fn item_invariants_hold_under_any_event_sequence(
        events in prop::collection::vec(event_strategy(), 0..30),
    ) {
        let sm = TransferItemStateMachine::new();
        let mut item = pending_items(Uuid::new_v4(), Uuid::new_v4(), [1]).remove(0);

        for event in events {
            let before = item.clone();
            let retry = event == transfer_core::TransferEvent::Retry;
            match sm.apply(&mut item, event, Utc::now()) {
                Ok(state) => {
                    prop_assert_eq!(item.status, state);
                    if state == TransferItemState::Pending {
                        prop_assert!(retry);
                        prop_assert_eq!(before.status, TransferItemState::Error);
                    }
                }
                Err(_) => prop_assert_eq!(&item, &before),
            }

            prop_assert!(item.attempt_count >= before.attempt_count);
            prop_assert_eq!(item.is_cancelled, item.status == TransferItemState::Cancelled);
            prop_assert_eq!(
                item.error_message.is_some(),
                item.status == TransferItemState::Error
            );
        }
    }
}
