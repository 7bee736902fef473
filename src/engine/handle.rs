// src/engine/handle.rs

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::ledger::{Completion, ExecutionRecord};
use crate::engine::{RecordId, TaskName};
use crate::types::{FailureReason, TaskStatus};

/// Terminal result of one execution, as delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub record: RecordId,
    pub status: TaskStatus,
    /// Process exit code; simple tasks only.
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    pub(crate) fn from_completion(record: RecordId, completion: &Completion) -> Self {
        Self {
            record,
            status: completion.status,
            exit_code: completion.exit_code,
            failure: completion.failure.clone(),
        }
    }
}

/// Caller's handle on a started execution.
///
/// Dropping the handle does not stop the task.
#[derive(Debug)]
pub struct ExecutionHandle {
    task: TaskName,
    record: RecordId,
    token: CancellationToken,
    done: oneshot::Receiver<ExecutionOutcome>,
}

impl ExecutionHandle {
    pub(crate) fn new(
        task: TaskName,
        record: RecordId,
        token: CancellationToken,
        done: oneshot::Receiver<ExecutionOutcome>,
    ) -> Self {
        Self {
            task,
            record,
            token,
            done,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn record_id(&self) -> RecordId {
        self.record
    }

    /// Stop this execution and everything running beneath it.
    ///
    /// The affected records are flagged `cancel_requested` as they finish.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> ExecutionOutcome {
        match self.done.await {
            Ok(outcome) => outcome,
            Err(_) => {
                // Only reachable if the runtime shut down under the driver.
                debug!(task = %self.task, record = self.record, "execution driver went away");
                ExecutionOutcome {
                    record: self.record,
                    status: TaskStatus::Stopped,
                    exit_code: None,
                    failure: None,
                }
            }
        }
    }

    /// Invoke `callback` with the outcome once the execution finishes.
    pub fn on_complete<F>(self, callback: F) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(ExecutionOutcome) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.wait().await) })
    }
}

/// Status of one subtask slot of a composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSummary {
    pub task: TaskName,
    pub record: RecordId,
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
}

/// Flattened view of a record and its direct children, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub task: TaskName,
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
    pub children: Vec<ChildSummary>,
    pub skipped: Vec<TaskName>,
}

impl ExecutionSummary {
    pub(crate) fn build<'a>(
        record: &ExecutionRecord,
        lookup: impl Fn(RecordId) -> Option<&'a ExecutionRecord>,
    ) -> Self {
        let children = record
            .children
            .iter()
            .filter_map(|id| lookup(*id))
            .map(|child| ChildSummary {
                task: child.task.clone(),
                record: child.id,
                status: child.status,
                exit_code: child.exit_code,
                failure: child.failure.clone(),
            })
            .collect();

        Self {
            task: record.task.clone(),
            status: record.status,
            exit_code: record.exit_code,
            failure: record.failure.clone(),
            children,
            skipped: record.skipped.clone(),
        }
    }
}
