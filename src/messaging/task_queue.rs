//! # Task Queue
//!
//! Bounded message-passing boundary between producers and the worker pool.
//!
//! Producers enqueue a typed [`TransferCommand`] and receive an opaque [`TaskId`]
//! immediately; they never wait for execution. When the channel is full,
//! [`TaskQueue::submit`] waits for capacity and [`TaskQueue::try_submit`] fails with
//! [`MessagingError::QueueFull`].
//!
//! Commands produced *by* running commands (batches fanned out by the orchestrator, the
//! orchestrator re-dispatched by a retry) go through a separate unbounded follow-up
//! lane via [`FollowUpDispatcher`]. A worker must never wait on the bounded channel it
//! is itself draining; the follow-up lane is bounded in practice by the item count of
//! the jobs already admitted through the bounded channel.
//!
//! Execution state for every handle lives in the [`TaskRegistry`], which doubles as
//! the progress report channel: workers publish `{current, total, status}` updates
//! there and callers poll them by handle. Finished states expire after a TTL.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::{MessagingError, MessagingResult};
use super::message::TransferCommand;

/// Opaque handle for one submitted unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Execution state reported for a task handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    /// Queued, not yet reporting
    Pending,
    Progress {
        current: usize,
        total: usize,
        status: String,
    },
    Success {
        result: serde_json::Value,
    },
    Failure {
        error: String,
    },
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure { .. })
    }
}

#[derive(Debug, Clone)]
struct TaskEntry {
    command: &'static str,
    /// Set for job-level handles, which are indexed in `job_tasks`
    job_id: Option<Uuid>,
    state: TaskState,
    updated_at: DateTime<Utc>,
}

/// Concurrent map of task handles to their latest state
#[derive(Debug)]
pub struct TaskRegistry {
    tasks: DashMap<TaskId, TaskEntry>,
    job_tasks: DashMap<Uuid, TaskId>,
    result_ttl: Duration,
}

impl TaskRegistry {
    pub fn new(result_ttl: Duration) -> Self {
        Self {
            tasks: DashMap::new(),
            job_tasks: DashMap::new(),
            result_ttl,
        }
    }

    fn register(&self, task_id: TaskId, command: &TransferCommand) {
        let job_id = command.job_id().filter(|_| command.is_job_level());
        self.tasks.insert(
            task_id,
            TaskEntry {
                command: command.name(),
                job_id,
                state: TaskState::Pending,
                updated_at: Utc::now(),
            },
        );
        if let Some(job_id) = job_id {
            self.job_tasks.insert(job_id, task_id);
        }
    }

    fn forget(&self, task_id: TaskId) {
        if let Some((_, entry)) = self.tasks.remove(&task_id) {
            if let Some(job_id) = entry.job_id {
                // A newer handle for the same job keeps its index entry
                self.job_tasks.remove_if(&job_id, |_, id| *id == task_id);
            }
        }
    }

    fn set_state(&self, task_id: TaskId, state: TaskState) {
        if let Some(mut entry) = self.tasks.get_mut(&task_id) {
            entry.state = state;
            entry.updated_at = Utc::now();
        }
    }

    pub fn report_progress(
        &self,
        task_id: TaskId,
        current: usize,
        total: usize,
        status: impl Into<String>,
    ) {
        self.set_state(
            task_id,
            TaskState::Progress {
                current,
                total,
                status: status.into(),
            },
        );
    }

    pub fn complete(&self, task_id: TaskId, result: serde_json::Value) {
        self.set_state(task_id, TaskState::Success { result });
    }

    pub fn fail(&self, task_id: TaskId, error: impl Into<String>) {
        self.set_state(
            task_id,
            TaskState::Failure {
                error: error.into(),
            },
        );
    }

    /// Latest state for a handle; `None` for unknown or expired handles
    pub fn status(&self, task_id: TaskId) -> Option<TaskState> {
        self.status_at(task_id, Utc::now())
    }

    pub fn status_at(&self, task_id: TaskId, now: DateTime<Utc>) -> Option<TaskState> {
        let entry = self.tasks.get(&task_id)?.clone();
        if self.is_expired(&entry, now) {
            self.forget(task_id);
            return None;
        }
        Some(entry.state)
    }

    /// Name of the command a handle was issued for
    pub fn command_name(&self, task_id: TaskId) -> Option<&'static str> {
        self.tasks.get(&task_id).map(|entry| entry.command)
    }

    /// Most recent job-level handle (process or retry) issued for a job
    pub fn latest_job_task(&self, job_id: Uuid) -> Option<TaskId> {
        let task_id = *self.job_tasks.get(&job_id)?;
        self.tasks.contains_key(&task_id).then_some(task_id)
    }

    /// Drop finished entries older than the TTL; returns how many were removed
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|entry| self.is_expired(entry.value(), now))
            .map(|entry| *entry.key())
            .collect();

        for task_id in &expired {
            self.forget(*task_id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "🧹 Pruned expired task results");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Number of jobs with an indexed job-level handle
    pub fn tracked_jobs(&self) -> usize {
        self.job_tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn is_expired(&self, entry: &TaskEntry, now: DateTime<Utc>) -> bool {
        entry.state.is_finished() && entry.updated_at + self.result_ttl < now
    }
}

/// A command together with the handle it was issued under
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub task_id: TaskId,
    pub command: TransferCommand,
}

/// Publishes progress for the task currently being executed
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    target: Option<(TaskId, Arc<TaskRegistry>)>,
}

impl ProgressReporter {
    pub fn new(task_id: TaskId, registry: Arc<TaskRegistry>) -> Self {
        Self {
            target: Some((task_id, registry)),
        }
    }

    /// A reporter that discards every report, for direct (unqueued) invocations
    pub fn detached() -> Self {
        Self { target: None }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.target.as_ref().map(|(task_id, _)| *task_id)
    }

    pub fn report(&self, current: usize, total: usize, status: impl Into<String>) {
        if let Some((task_id, registry)) = &self.target {
            registry.report_progress(*task_id, current, total, status);
        }
    }
}

/// Enqueues commands for asynchronous execution
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Enqueue and return immediately with the task handle
    async fn dispatch(&self, command: TransferCommand) -> MessagingResult<TaskId>;
}

/// Consumer side of both lanes
#[derive(Debug)]
pub struct QueueReceiver {
    submissions: mpsc::Receiver<QueuedCommand>,
    follow_ups: mpsc::UnboundedReceiver<QueuedCommand>,
}

impl QueueReceiver {
    /// Next command, follow-ups first; `None` once both lanes are closed and drained
    pub async fn recv(&mut self) -> Option<QueuedCommand> {
        tokio::select! {
            biased;
            Some(queued) = self.follow_ups.recv() => Some(queued),
            Some(queued) = self.submissions.recv() => Some(queued),
            else => None,
        }
    }
}

/// Producer side of the task queue
#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<QueuedCommand>,
    follow_up_sender: mpsc::UnboundedSender<QueuedCommand>,
    registry: Arc<TaskRegistry>,
    capacity: usize,
}

impl TaskQueue {
    /// Create the queue and the receiver the worker pool consumes
    pub fn new(buffer_size: usize, result_ttl: Duration) -> (Self, QueueReceiver) {
        let (sender, submissions) = mpsc::channel(buffer_size);
        let (follow_up_sender, follow_ups) = mpsc::unbounded_channel();
        let queue = Self {
            sender,
            follow_up_sender,
            registry: Arc::new(TaskRegistry::new(result_ttl)),
            capacity: buffer_size,
        };
        let receiver = QueueReceiver {
            submissions,
            follow_ups,
        };
        (queue, receiver)
    }

    /// Enqueue a command, waiting for channel capacity
    pub async fn submit(&self, command: TransferCommand) -> MessagingResult<TaskId> {
        let queued = self.prepare(command);
        let task_id = queued.task_id;

        if self.sender.send(queued).await.is_err() {
            self.registry.forget(task_id);
            warn!(task_id = %task_id, "Task queue closed, command dropped");
            return Err(MessagingError::QueueClosed);
        }

        debug!(task_id = %task_id, "📤 Command enqueued");
        Ok(task_id)
    }

    /// Enqueue a command without waiting; fails when the channel is full
    pub fn try_submit(&self, command: TransferCommand) -> MessagingResult<TaskId> {
        let queued = self.prepare(command);
        let task_id = queued.task_id;

        match self.sender.try_send(queued) {
            Ok(()) => Ok(task_id),
            Err(err) => {
                self.registry.forget(task_id);
                Err(match err {
                    mpsc::error::TrySendError::Full(_) => MessagingError::QueueFull {
                        capacity: self.capacity,
                    },
                    mpsc::error::TrySendError::Closed(_) => MessagingError::QueueClosed,
                })
            }
        }
    }

    /// Enqueue a command on the unbounded follow-up lane; never waits
    pub fn submit_follow_up(&self, command: TransferCommand) -> MessagingResult<TaskId> {
        let queued = self.prepare(command);
        let task_id = queued.task_id;

        if self.follow_up_sender.send(queued).is_err() {
            self.registry.forget(task_id);
            return Err(MessagingError::QueueClosed);
        }
        Ok(task_id)
    }

    /// Dispatcher for producers that run inside the worker pool
    pub fn follow_up_dispatcher(&self) -> FollowUpDispatcher {
        FollowUpDispatcher {
            queue: self.clone(),
        }
    }

    pub fn task_status(&self, task_id: TaskId) -> Option<TaskState> {
        self.registry.status(task_id)
    }

    pub fn registry(&self) -> Arc<TaskRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn prepare(&self, command: TransferCommand) -> QueuedCommand {
        let task_id = TaskId::new();
        self.registry.register(task_id, &command);
        debug!(
            task_id = %task_id,
            command = command.name(),
            job_id = ?command.job_id(),
            "Registering task"
        );
        QueuedCommand { task_id, command }
    }
}

#[async_trait]
impl TaskDispatcher for TaskQueue {
    async fn dispatch(&self, command: TransferCommand) -> MessagingResult<TaskId> {
        self.submit(command).await
    }
}

/// Dispatches onto the follow-up lane, so a handler never blocks on queue capacity
#[derive(Debug, Clone)]
pub struct FollowUpDispatcher {
    queue: TaskQueue,
}

#[async_trait]
impl TaskDispatcher for FollowUpDispatcher {
    async fn dispatch(&self, command: TransferCommand) -> MessagingResult<TaskId> {
        self.queue.submit_follow_up(command)
    }
}
