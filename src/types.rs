use std::fmt;

use serde::Deserialize;

/// How a composite task runs its subtasks.
///
/// - `Serial`: one at a time, in declared order (default).
/// - `Parallel`: all at once, bounded by the parallelism limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Serial,
    Parallel,
}

/// Kind of value an input collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Free text.
    #[default]
    Prompt,
    /// One of a fixed list of options.
    Select,
}

/// Observable status of a task (or of one execution record).
///
/// `Idle` is only ever reported for tasks that have never run in this engine;
/// an execution record starts in `Running` and moves to exactly one of the
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Idle,
    Running,
    Success,
    Failed,
    Stopped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Stopped
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Why a record ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The process exited with a nonzero code.
    ExitCode(i32),
    /// A composite slot referenced a task name absent from the registry.
    SubtaskNotFound(String),
    /// The process could not be started at all.
    SpawnFailed(String),
    /// At least one subtask of a composite failed.
    SubtaskFailed(Vec<String>),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ExitCode(code) => write!(f, "exited with code {code}"),
            FailureReason::SubtaskNotFound(name) => write!(f, "subtask not found: {name}"),
            FailureReason::SpawnFailed(msg) => write!(f, "failed to spawn: {msg}"),
            FailureReason::SubtaskFailed(names) => {
                write!(f, "subtask(s) failed: {}", names.join(", "))
            }
        }
    }
}
