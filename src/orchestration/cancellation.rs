//! # Cancellation Controller
//!
//! Best-effort cancellation: items still `pending` or `processing` become `cancelled`
//! and are skipped by later orchestrator runs. A batch that is already executing is
//! not interrupted and may still write `success` or `error` over a cancelled item.
//!
//! Each write is conditional on the status that was read, so an item a batch committed
//! in the meantime keeps its outcome and is not counted.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::types::CancellationResult;
use crate::constants::status_groups::CANCELLABLE_STATES;
use crate::database::StoreProvider;
use crate::error::TransferResult;
use crate::logging::log_job_operation;
use crate::state_machine::{TransferEvent, TransferItemStateMachine};

pub struct CancellationController {
    store: Arc<dyn StoreProvider>,
    state_machine: TransferItemStateMachine,
}

impl CancellationController {
    pub fn new(store: Arc<dyn StoreProvider>) -> Self {
        Self {
            store,
            state_machine: TransferItemStateMachine::new(),
        }
    }

    pub async fn cancel_job(&self, job_id: Uuid) -> TransferResult<CancellationResult> {
        let mut session = self.store.session().await?;
        let items = session.items_with_status(job_id, CANCELLABLE_STATES).await?;

        let now = Utc::now();
        let mut cancelled_count = 0;
        for mut item in items {
            let read_status = item.status;
            self.state_machine.apply(&mut item, TransferEvent::Cancel, now)?;
            if session.save_item_if_status(&item, read_status).await? {
                cancelled_count += 1;
            } else {
                debug!(
                    job_id = %job_id,
                    company_id = item.company_id,
                    "Item left {read_status} before it could be cancelled"
                );
            }
        }

        let message = format!("Cancelled {cancelled_count} items");
        log_job_operation("cancel_job", job_id, "cancelled", Some(&message));

        Ok(CancellationResult {
            job_id,
            message,
            cancelled_count,
        })
    }
}
