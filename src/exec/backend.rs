// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The engine talks to a `ProcessBackend` instead of spawning processes
//! itself. Production code uses [`RealProcessBackend`]; tests provide a fake
//! that never touches the OS.
//!
//! The contract every backend honours:
//! - `spawn` never blocks on the child; it returns a [`ProcessHandle`] right
//!   away and delivers output through the [`OutputSink`].
//! - the handle's exit result resolves exactly once, whether the child exited
//!   on its own or was cancelled.
//!
//! [`RealProcessBackend`]: super::task_runner::RealProcessBackend

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::engine::{RecordId, TaskName};
use crate::errors::Result;
use crate::exec::output::OutputSink;

/// A fully substituted command, ready to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub task: TaskName,
    pub record: RecordId,
    pub command: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

/// Terminal result of one child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Whether termination followed a cancellation request.
    pub cancelled: bool,
}

impl ProcessExit {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            cancelled: false,
        }
    }
}

/// Caller's side of a running child process.
#[derive(Debug)]
pub struct ProcessHandle {
    cancel: Option<oneshot::Sender<()>>,
    exit: oneshot::Receiver<ProcessExit>,
}

impl ProcessHandle {
    /// Pair a cancel sender with an exit receiver. Backends keep the other
    /// ends and must send on `exit` exactly once.
    pub fn new(cancel: oneshot::Sender<()>, exit: oneshot::Receiver<ProcessExit>) -> Self {
        Self {
            cancel: Some(cancel),
            exit,
        }
    }

    /// Request termination. Returns false if already requested or the
    /// process is gone.
    pub fn cancel(&mut self) -> bool {
        match self.cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Wait for the exit result. Safe to call again after being interrupted
    /// (e.g. by a `select!`).
    pub async fn wait(&mut self) -> ProcessExit {
        match (&mut self.exit).await {
            Ok(exit) => exit,
            // The backend dropped its sender without reporting.
            Err(_) => ProcessExit {
                code: None,
                cancelled: self.cancel.is_none(),
            },
        }
    }
}

/// Trait abstracting how a single command is executed.
pub trait ProcessBackend: Send + Sync + 'static {
    /// Launch `spec`. Must be called from within a Tokio runtime.
    ///
    /// An `Err` means the process never started.
    fn spawn(&self, spec: ProcessSpec, output: OutputSink) -> Result<ProcessHandle>;
}
