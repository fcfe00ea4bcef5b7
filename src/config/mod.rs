//! # Transfer Engine Configuration
//!
//! Layered configuration for the transfer engine. Sources, lowest precedence first:
//!
//! 1. Built-in defaults ([`TransferConfig::default`])
//! 2. A TOML file (`TRANSFER_CONFIG_PATH`, falling back to `config/transfer.toml`)
//! 3. `TRANSFER__<SECTION>__<KEY>` environment variables
//! 4. `DATABASE_URL`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use transfer_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let batch_size = manager.config().batch.batch_size;
//! let workers = manager.config().queue.worker_count;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::defaults;

/// Root configuration structure mirroring `config/transfer.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Database connection and pooling
    pub database: DatabaseConfig,

    /// Task queue and worker pool sizing
    pub queue: QueueConfig,

    /// Batch partitioning and reporting
    pub batch: BatchConfig,

    /// Retention reaper settings
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/collection_transfers_development".to_string(),
            max_connections: 20,
            min_connections: 1,
            acquire_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Concurrent consumers of the task queue
    pub worker_count: usize,
    /// Bounded channel capacity; submitters wait when it is full
    pub buffer_size: usize,
    /// How long finished task states stay queryable
    pub result_ttl_seconds: i64,
    /// How often expired task states are dropped from the registry
    pub prune_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: defaults::WORKER_COUNT,
            buffer_size: defaults::QUEUE_BUFFER_SIZE,
            result_ttl_seconds: defaults::TASK_RESULT_TTL_SECONDS,
            prune_interval_ms: defaults::TASK_PRUNE_INTERVAL_MS,
        }
    }
}

impl QueueConfig {
    pub fn result_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.result_ttl_seconds)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items per batch descriptor
    pub batch_size: usize,
    /// Emit a progress report every N processed items
    pub progress_interval: usize,
    /// Item error messages carried in a batch result
    pub max_reported_errors: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            progress_interval: defaults::PROGRESS_INTERVAL,
            max_reported_errors: defaults::MAX_REPORTED_ERRORS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Run periodic sweeps from the worker binary
    pub enabled: bool,
    pub retention_days: i64,
    pub sweep_interval_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: defaults::RETENTION_DAYS,
            sweep_interval_seconds: defaults::RETENTION_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl RetentionConfig {
    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl TransferConfig {
    /// Reject values the engine cannot operate with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::MissingRequiredField {
                field: "database.url".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                self.database.max_connections,
                "must be at least 1",
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigurationError::invalid_value(
                "database.min_connections",
                self.database.min_connections,
                "must not exceed database.max_connections",
            ));
        }
        if self.queue.worker_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.worker_count",
                self.queue.worker_count,
                "must be at least 1",
            ));
        }
        if self.queue.buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.buffer_size",
                self.queue.buffer_size,
                "must be at least 1",
            ));
        }
        if self.queue.result_ttl_seconds < 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.result_ttl_seconds",
                self.queue.result_ttl_seconds,
                "must not be negative",
            ));
        }
        if self.queue.prune_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.prune_interval_ms",
                self.queue.prune_interval_ms,
                "must be at least 1",
            ));
        }
        if self.batch.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.batch_size",
                self.batch.batch_size,
                "must be at least 1",
            ));
        }
        if self.batch.progress_interval == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.progress_interval",
                self.batch.progress_interval,
                "must be at least 1",
            ));
        }
        if self.retention.retention_days <= 0 {
            return Err(ConfigurationError::invalid_value(
                "retention.retention_days",
                self.retention.retention_days,
                "must be positive",
            ));
        }
        if self.retention.sweep_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "retention.sweep_interval_seconds",
                self.retention.sweep_interval_seconds,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
