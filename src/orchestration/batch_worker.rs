//! # Batch Worker
//!
//! Executes one bounded batch of transfer items.
//!
//! ## Per-batch algorithm
//!
//! 1. Acquire a store session scoped to this invocation
//! 2. One bulk membership lookup for every company in the batch
//! 3. For each company, strictly in list order:
//!    - look up its item by `(job_id, company_id, target_collection_id)`
//!    - `Start` the attempt (stamps `last_attempt_at`, bumps `attempt_count`)
//!    - already a member: `Complete` without inserting
//!    - otherwise insert the membership; a uniqueness violation fails the item only
//!    - persist the item (one write per item, conditional on the status read)
//!    - every `progress_interval` items, publish progress
//! 4. Classify the batch from the success and error tallies
//!
//! Item errors never escape the loop. Setup failures (no session, failed membership
//! lookup) turn the whole batch into an `error` result with every item counted as
//! failed; nothing propagates past the batch boundary.
//!
//! Each item is committed on its own, so a crash mid-batch loses at most the item in
//! flight. Cancellation is not re-checked between items.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::types::{BatchResult, BatchStatus};
use crate::config::BatchConfig;
use crate::database::{StoreProvider, StoreSession};
use crate::logging::{log_batch_operation, log_error};
use crate::messaging::{BatchExecutionMessage, ProgressReporter};
use crate::models::TransferItem;
use crate::state_machine::{TransferEvent, TransferItemState, TransferItemStateMachine};

/// Running success and error tally for one batch
#[derive(Debug)]
struct BatchTally {
    success_count: usize,
    error_count: usize,
    errors: Vec<String>,
    max_reported_errors: usize,
}

impl BatchTally {
    fn new(max_reported_errors: usize) -> Self {
        Self {
            success_count: 0,
            error_count: 0,
            errors: Vec::new(),
            max_reported_errors,
        }
    }

    fn record_success(&mut self) {
        self.success_count += 1;
    }

    fn record_error(&mut self, message: String) {
        self.error_count += 1;
        if self.errors.len() < self.max_reported_errors {
            self.errors.push(message);
        }
    }
}

pub struct BatchWorker {
    store: Arc<dyn StoreProvider>,
    state_machine: TransferItemStateMachine,
    config: BatchConfig,
}

impl BatchWorker {
    pub fn new(store: Arc<dyn StoreProvider>, config: BatchConfig) -> Self {
        Self {
            store,
            state_machine: TransferItemStateMachine::new(),
            config,
        }
    }

    /// Execute one batch; always returns a result record
    pub async fn execute(
        &self,
        batch: &BatchExecutionMessage,
        progress: &ProgressReporter,
    ) -> BatchResult {
        let total = batch.company_ids.len();
        info!(
            job_id = %batch.job_id,
            batch_number = batch.batch_number,
            total = total,
            "📦 Processing batch"
        );
        progress.report(
            0,
            total,
            format!("Processing batch {}...", batch.batch_number),
        );

        let mut session = match self.store.session().await {
            Ok(session) => session,
            Err(err) => return self.batch_failed(batch, err.to_string()),
        };

        let existing_members = match session
            .existing_members(batch.target_collection_id, &batch.company_ids)
            .await
        {
            Ok(members) => members,
            Err(err) => return self.batch_failed(batch, err.to_string()),
        };
        debug!(
            job_id = %batch.job_id,
            batch_number = batch.batch_number,
            already_members = existing_members.len(),
            "Batch {}: {} companies already in target collection",
            batch.batch_number,
            existing_members.len()
        );

        let mut tally = BatchTally::new(self.config.max_reported_errors);
        for (index, company_id) in batch.company_ids.iter().copied().enumerate() {
            match self
                .transfer_company(session.as_mut(), batch, company_id, &existing_members)
                .await
            {
                Ok(()) => tally.record_success(),
                Err(message) => {
                    debug!(
                        job_id = %batch.job_id,
                        company_id = company_id,
                        error = %message,
                        "Transfer item failed"
                    );
                    tally.record_error(format!("Company {company_id}: {message}"));
                }
            }

            let processed = index + 1;
            // A zero interval disables intermediate reports
            if processed.checked_rem(self.config.progress_interval) == Some(0) {
                progress.report(
                    processed,
                    total,
                    format!(
                        "Batch {}: Processed {processed}/{total}...",
                        batch.batch_number
                    ),
                );
            }
        }

        let result = Self::summarize(batch, tally);
        log_batch_operation(
            "process_batch",
            batch.job_id,
            batch.batch_number,
            result.status.as_str(),
            result.success_count,
            result.error_count,
        );
        result
    }

    /// Transfer one company; `Err` carries the item-level error message
    async fn transfer_company(
        &self,
        session: &mut dyn StoreSession,
        batch: &BatchExecutionMessage,
        company_id: i64,
        existing_members: &HashSet<i64>,
    ) -> Result<(), String> {
        let mut item = session
            .find_item(batch.job_id, company_id, batch.target_collection_id)
            .await
            .map_err(|err| err.to_string())?
            .ok_or_else(|| "Transfer item not found".to_string())?;

        // Re-driven batches meet items an earlier run already completed
        if item.status == TransferItemState::Success {
            return Ok(());
        }

        let read_status = item.status;
        let now = Utc::now();
        self.state_machine
            .apply(&mut item, TransferEvent::Start, now)
            .map_err(|err| err.to_string())?;

        let outcome = if existing_members.contains(&company_id) {
            TransferEvent::Complete
        } else {
            match session
                .insert_membership(company_id, batch.target_collection_id)
                .await
            {
                Ok(()) => TransferEvent::Complete,
                Err(err) => {
                    if err.is_constraint_violation() {
                        warn!(
                            job_id = %batch.job_id,
                            company_id = company_id,
                            collection_id = %batch.target_collection_id,
                            "Concurrent membership insert lost the race"
                        );
                    }
                    TransferEvent::fail_with_error(err.to_string())
                }
            }
        };
        let failure = outcome.error_message().map(str::to_string);

        self.state_machine
            .apply(&mut item, outcome, now)
            .map_err(|err| err.to_string())?;
        if !self
            .persist_outcome(session, batch, &item, read_status)
            .await?
        {
            // Another batch already completed this company
            return Ok(());
        }

        match failure {
            None => Ok(()),
            Some(message) => Err(message),
        }
    }

    /// Write the item unless another writer moved it since it was read.
    ///
    /// Returns `false` when the row became `success` meanwhile; it is kept as is. A row
    /// that was cancelled meanwhile still takes this attempt's outcome, as `Start` is
    /// accepted from `cancelled`.
    async fn persist_outcome(
        &self,
        session: &mut dyn StoreSession,
        batch: &BatchExecutionMessage,
        item: &TransferItem,
        read_status: TransferItemState,
    ) -> Result<bool, String> {
        if session
            .save_item_if_status(item, read_status)
            .await
            .map_err(|err| err.to_string())?
        {
            return Ok(true);
        }

        let current = session
            .find_item(batch.job_id, item.company_id, batch.target_collection_id)
            .await
            .map_err(|err| err.to_string())?
            .ok_or_else(|| "Transfer item not found".to_string())?;
        debug!(
            job_id = %batch.job_id,
            company_id = item.company_id,
            read = %read_status,
            current = %current.status,
            "Transfer item moved by a concurrent writer"
        );

        match current.status {
            TransferItemState::Success => Ok(false),
            TransferItemState::Cancelled => {
                if session
                    .save_item_if_status(item, TransferItemState::Cancelled)
                    .await
                    .map_err(|err| err.to_string())?
                {
                    Ok(true)
                } else {
                    Err("Transfer item changed concurrently".to_string())
                }
            }
            other => Err(format!("Transfer item changed concurrently to {other}")),
        }
    }

    fn summarize(batch: &BatchExecutionMessage, tally: BatchTally) -> BatchResult {
        let status = BatchStatus::classify(tally.success_count, tally.error_count);
        let message = match status {
            BatchStatus::Success => format!(
                "Batch {} completed successfully: {} companies transferred",
                batch.batch_number, tally.success_count
            ),
            BatchStatus::PartialSuccess | BatchStatus::Error => format!(
                "Batch {} completed with errors: {} success, {} errors",
                batch.batch_number, tally.success_count, tally.error_count
            ),
        };

        BatchResult {
            status,
            message,
            batch_number: batch.batch_number,
            success_count: tally.success_count,
            error_count: tally.error_count,
            total_count: batch.company_ids.len(),
            errors: tally.errors,
        }
    }

    fn batch_failed(&self, batch: &BatchExecutionMessage, error: String) -> BatchResult {
        log_error(
            "BatchWorker",
            "execute",
            &error,
            Some(&format!(
                "job_id={} batch_number={}",
                batch.job_id, batch.batch_number
            )),
        );

        let total = batch.company_ids.len();
        let message = format!("Batch {} failed: {error}", batch.batch_number);
        BatchResult {
            status: BatchStatus::Error,
            errors: vec![message.clone()],
            message,
            batch_number: batch.batch_number,
            success_count: 0,
            error_count: total,
            total_count: total,
        }
    }
}
