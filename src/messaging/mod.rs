//! # Task Queue Messaging
//!
//! Explicit message-passing boundary between the components that produce work and
//! the worker pool that executes it:
//!
//! - [`message`] - typed command descriptors
//! - [`task_queue`] - bounded submissions, the follow-up lane, task handles and the
//!   progress registry
//! - [`worker_pool`] - consumers executing commands through a [`CommandHandler`]

pub mod errors;
pub mod message;
pub mod task_queue;
pub mod worker_pool;

pub use errors::{MessagingError, MessagingResult};
pub use message::{BatchExecutionMessage, JobSubmissionMessage, RetryMessage, TransferCommand};
pub use task_queue::{
    FollowUpDispatcher, ProgressReporter, QueueReceiver, QueuedCommand, TaskDispatcher, TaskId,
    TaskQueue, TaskRegistry, TaskState,
};
pub use worker_pool::{CommandHandler, WorkerPool};
