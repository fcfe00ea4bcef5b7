#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Collection Transfer Core
//!
//! Batch transfer job engine that moves companies between collections asynchronously,
//! tracking every company's transfer as its own durable record.
//!
//! ## Overview
//!
//! A caller submits a job (one `pending` transfer item per company). The job
//! orchestrator splits the pending items into fixed-size batches and dispatches each
//! batch to a bounded task queue. A pool of workers executes batches concurrently;
//! within a batch, items run strictly in order with one durable write per item.
//! Re-running a batch is safe: companies already in the target collection are
//! recorded as `success` without a second insert, and the membership table's
//! uniqueness constraint is the backstop against concurrent duplicates.
//!
//! ## Module Organization
//!
//! - [`models`] - Transfer items and membership records
//! - [`state_machine`] - Closed item state enum and transition table
//! - [`database`] - Store traits with PostgreSQL and in-memory providers
//! - [`messaging`] - Task queue, task handles, progress registry and worker pool
//! - [`orchestration`] - Job creation, orchestration, batch execution, retry,
//!   cancellation, retention and status queries
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transfer_core::config::TransferConfig;
//! use transfer_core::database::InMemoryStore;
//! use transfer_core::{TransferJobRequest, TransferSystem};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! let system = TransferSystem::start(Arc::new(store), TransferConfig::default())?;
//!
//! let job = system
//!     .create_job(TransferJobRequest {
//!         company_ids: (1..=150).collect(),
//!         source_collection_id: None,
//!         target_collection_id: Uuid::new_v4(),
//!     })
//!     .await?;
//! println!("job {} has {} items", job.job_id, job.total_items);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

pub use crate::config::{ConfigManager, TransferConfig};
pub use constants::{status_groups, TransferStatus};
pub use database::{InMemoryStore, PgStoreProvider, StoreProvider};
pub use error::{TransferError, TransferResult};
pub use messaging::{TaskId, TaskState, TransferCommand};
pub use models::{NewTransferItem, TransferItem};
pub use orchestration::{BatchResult, BatchStatus, JobStatus, TransferJobRequest, TransferSystem};
pub use state_machine::{TransferEvent, TransferItemState, TransferItemStateMachine};
