// src/exec/output.rs

//! Live process output delivery.
//!
//! Every line a child writes is published to all current subscribers through
//! unbounded channels, so a slow reader never causes lines to be dropped.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::trace;

use crate::engine::{RecordId, TaskName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of output from one execution record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub task: TaskName,
    pub record: RecordId,
    pub stream: OutputStream,
    pub line: String,
}

/// Fan-out point for output lines. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct OutputHub {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<OutputLine>>>>,
}

impl OutputHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every line published from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OutputLine> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn publish(&self, line: OutputLine) {
        let mut subs = self.lock();
        // Dropped receivers are pruned lazily.
        subs.retain(|tx| tx.send(line.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<OutputLine>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-record handle given to a process backend for emitting lines.
#[derive(Debug, Clone)]
pub struct OutputSink {
    task: TaskName,
    record: RecordId,
    hub: OutputHub,
}

impl OutputSink {
    pub fn new(task: TaskName, record: RecordId, hub: OutputHub) -> Self {
        Self { task, record, hub }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn emit(&self, stream: OutputStream, line: impl Into<String>) {
        let line = line.into();
        trace!(task = %self.task, record = self.record, ?stream, "{}", line);
        self.hub.publish(OutputLine {
            task: self.task.clone(),
            record: self.record,
            stream,
            line,
        });
    }
}
