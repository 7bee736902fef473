// src/engine/ledger.rs

//! Execution records, the running-set and history.
//!
//! `Ledger` is plain synchronous state. The engine keeps it behind one mutex
//! and every transition below happens inside a single lock acquisition, so a
//! record's terminal status is written exactly once and its running-set entry
//! disappears in the same step.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::engine::{RecordId, TaskName};
use crate::types::{FailureReason, TaskStatus};

/// One invocation of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub id: RecordId,
    pub task: TaskName,
    /// Composite record this one runs under, if any.
    pub parent: Option<RecordId>,
    /// Substituted command line (simple tasks only).
    pub command: Option<String>,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub status: TaskStatus,
    /// Process exit code (simple tasks only).
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
    /// Launched subtasks, in launch order.
    pub children: Vec<RecordId>,
    /// Subtasks that were never launched.
    pub skipped: Vec<TaskName>,
    pub cancel_requested: bool,
}

impl ExecutionRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock run time; `None` while running.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at
            .and_then(|end| end.duration_since(self.started_at).ok())
    }
}

/// Terminal values written by [`Ledger::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
}

#[derive(Debug, Default)]
pub struct Ledger {
    /// Append-only; a record's id is its index.
    records: Vec<ExecutionRecord>,
    /// Running records per task name. A name may run more than once at a
    /// time when several composites share a subtask.
    running: HashMap<TaskName, Vec<RecordId>>,
    /// Most recent record per task name.
    latest: HashMap<TaskName, RecordId>,
    /// Cancellation tokens of running records.
    tokens: HashMap<RecordId, CancellationToken>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `Running` record and enter it into the running-set.
    pub fn begin(
        &mut self,
        task: &str,
        parent: Option<RecordId>,
        token: CancellationToken,
    ) -> RecordId {
        let id = self.records.len();
        self.records.push(ExecutionRecord {
            id,
            task: task.to_string(),
            parent,
            command: None,
            started_at: SystemTime::now(),
            ended_at: None,
            status: TaskStatus::Running,
            exit_code: None,
            failure: None,
            children: Vec::new(),
            skipped: Vec::new(),
            cancel_requested: false,
        });

        if let Some(parent) = parent.and_then(|p| self.records.get_mut(p)) {
            parent.children.push(id);
        }
        self.running.entry(task.to_string()).or_default().push(id);
        self.latest.insert(task.to_string(), id);
        self.tokens.insert(id, token);
        id
    }

    pub fn set_command(&mut self, id: RecordId, command: &str) {
        if let Some(rec) = self.records.get_mut(id) {
            rec.command = Some(command.to_string());
        }
    }

    pub fn mark_skipped(&mut self, id: RecordId, subtasks: impl IntoIterator<Item = TaskName>) {
        if let Some(rec) = self.records.get_mut(id) {
            rec.skipped.extend(subtasks);
        }
    }

    /// Move a record to its terminal state and drop it from the running-set.
    ///
    /// A record whose token fired is flagged `cancel_requested`, however the
    /// cancellation arrived.
    ///
    /// Returns `false` (and changes nothing) if the record is unknown or
    /// already terminal.
    pub fn finish(&mut self, id: RecordId, completion: Completion) -> bool {
        debug_assert!(completion.status.is_terminal());

        let Some(rec) = self.records.get_mut(id) else {
            return false;
        };
        if rec.is_terminal() {
            return false;
        }

        rec.status = completion.status;
        rec.exit_code = completion.exit_code;
        rec.failure = completion.failure;
        rec.ended_at = Some(SystemTime::now());
        // Picks up cancellation that bypassed `request_cancel*`: the caller's
        // handle, or a parent's token reaching this child.
        if self.tokens.get(&id).is_some_and(CancellationToken::is_cancelled) {
            rec.cancel_requested = true;
        }

        if let Some(ids) = self.running.get_mut(&rec.task) {
            ids.retain(|r| *r != id);
            if ids.is_empty() {
                self.running.remove(&rec.task);
            }
        }
        self.tokens.remove(&id);
        true
    }

    /// Flag every running record of `task` as cancel-requested and return
    /// their tokens for the caller to fire outside the lock.
    pub fn request_cancel(&mut self, task: &str) -> Vec<CancellationToken> {
        let ids = self.running.get(task).cloned().unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.request_cancel_record(id))
            .collect()
    }

    pub fn request_cancel_record(&mut self, id: RecordId) -> Option<CancellationToken> {
        let token = self.tokens.get(&id)?.clone();
        if let Some(rec) = self.records.get_mut(id) {
            rec.cancel_requested = true;
        }
        Some(token)
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.running.contains_key(task)
    }

    /// `Running` while any instance runs, else the latest record's status,
    /// else `Idle`.
    pub fn status(&self, task: &str) -> TaskStatus {
        if self.is_running(task) {
            return TaskStatus::Running;
        }
        self.latest
            .get(task)
            .and_then(|id| self.records.get(*id))
            .map(|rec| rec.status)
            .unwrap_or(TaskStatus::Idle)
    }

    pub fn running_tasks(&self) -> BTreeSet<TaskName> {
        self.running.keys().cloned().collect()
    }

    pub fn running_count(&self) -> usize {
        self.running.values().map(Vec::len).sum()
    }

    pub fn get(&self, id: RecordId) -> Option<&ExecutionRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(status: TaskStatus) -> Completion {
        Completion {
            status,
            exit_code: None,
            failure: None,
        }
    }

    #[test]
    fn begin_and_finish_maintain_running_set() {
        let mut ledger = Ledger::new();
        let id = ledger.begin("build", None, CancellationToken::new());
        assert_eq!(ledger.status("build"), TaskStatus::Running);
        assert!(ledger.running_tasks().contains("build"));

        assert!(ledger.finish(id, done(TaskStatus::Success)));
        assert_eq!(ledger.status("build"), TaskStatus::Success);
        assert!(ledger.running_tasks().is_empty());
        assert!(ledger.get(id).unwrap().ended_at.is_some());
    }

    #[test]
    fn terminal_status_is_written_once() {
        let mut ledger = Ledger::new();
        let id = ledger.begin("t", None, CancellationToken::new());
        assert!(ledger.finish(id, done(TaskStatus::Stopped)));
        assert!(!ledger.finish(id, done(TaskStatus::Success)));
        assert_eq!(ledger.get(id).unwrap().status, TaskStatus::Stopped);
    }

    #[test]
    fn never_run_task_is_idle() {
        assert_eq!(Ledger::new().status("nope"), TaskStatus::Idle);
    }

    #[test]
    fn shared_subtask_stays_running_until_last_instance_finishes() {
        let mut ledger = Ledger::new();
        let a = ledger.begin("lint", None, CancellationToken::new());
        let b = ledger.begin("lint", None, CancellationToken::new());
        assert_eq!(ledger.running_count(), 2);

        ledger.finish(a, done(TaskStatus::Failed));
        assert_eq!(ledger.status("lint"), TaskStatus::Running);

        ledger.finish(b, done(TaskStatus::Success));
        assert_eq!(ledger.status("lint"), TaskStatus::Success);
    }

    #[test]
    fn children_are_linked_to_parent() {
        let mut ledger = Ledger::new();
        let parent = ledger.begin("all", None, CancellationToken::new());
        let child = ledger.begin("a", Some(parent), CancellationToken::new());
        ledger.mark_skipped(parent, ["b".to_string()]);

        let rec = ledger.get(parent).unwrap();
        assert_eq!(rec.children, vec![child]);
        assert_eq!(rec.skipped, vec!["b".to_string()]);
        assert_eq!(ledger.get(child).unwrap().parent, Some(parent));
    }

    #[test]
    fn cancel_request_only_reaches_running_records() {
        let mut ledger = Ledger::new();
        let token = CancellationToken::new();
        let id = ledger.begin("srv", None, token.clone());
        assert_eq!(ledger.request_cancel("srv").len(), 1);
        assert!(ledger.get(id).unwrap().cancel_requested);

        ledger.finish(id, done(TaskStatus::Stopped));
        assert!(ledger.request_cancel("srv").is_empty());
    }

    #[test]
    fn fired_token_marks_record_cancel_requested_on_finish() {
        let mut ledger = Ledger::new();
        let parent_token = CancellationToken::new();
        let parent = ledger.begin("all", None, parent_token.clone());
        let child = ledger.begin("a", Some(parent), parent_token.child_token());
        let done_early = ledger.begin("b", Some(parent), parent_token.child_token());
        ledger.finish(done_early, done(TaskStatus::Success));

        parent_token.cancel();
        ledger.finish(child, done(TaskStatus::Stopped));
        ledger.finish(parent, done(TaskStatus::Stopped));

        assert!(ledger.get(parent).unwrap().cancel_requested);
        assert!(ledger.get(child).unwrap().cancel_requested);
        assert!(!ledger.get(done_early).unwrap().cancel_requested);
    }
}
