// src/engine/runtime.rs

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::driver::run_record;
use crate::engine::handle::{ExecutionHandle, ExecutionSummary};
use crate::engine::ledger::{ExecutionRecord, Ledger};
use crate::engine::{EngineOptions, RecordId, TaskName};
use crate::errors::{Result, TaskweaveError};
use crate::exec::{OutputHub, OutputLine, ProcessBackend};
use crate::inputs::InputValues;
use crate::registry::TaskRegistry;
use crate::types::TaskStatus;

/// Shared state behind every [`Engine`] clone and every running driver.
pub(crate) struct EngineInner<B: ProcessBackend> {
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) backend: B,
    pub(crate) options: EngineOptions,
    pub(crate) output: OutputHub,
    ledger: Mutex<Ledger>,
}

impl<B: ProcessBackend> EngineInner<B> {
    /// Lock the ledger. A poisoned lock still holds consistent data because
    /// every mutation is a single short critical section.
    pub(crate) fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Runs tasks from a registry and keeps the running-set and history.
///
/// Cloning is cheap and every clone drives the same state. All methods that
/// start work must be called from within a Tokio runtime.
pub struct Engine<B: ProcessBackend> {
    inner: Arc<EngineInner<B>>,
}

impl<B: ProcessBackend> Clone for Engine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: ProcessBackend> fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("tasks", &self.inner.registry.len())
            .field("options", &self.inner.options)
            .field("running", &self.list_running())
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend> Engine<B> {
    pub fn new(registry: impl Into<Arc<TaskRegistry>>, backend: B, options: EngineOptions) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry: registry.into(),
                backend,
                options,
                output: OutputHub::new(),
                ledger: Mutex::new(Ledger::new()),
            }),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Start `task` with already-collected input values.
    ///
    /// Returns immediately. `Err` is reserved for problems that prevent the
    /// run from starting at all (unknown task, task already running); every
    /// outcome after that arrives through the handle.
    pub fn execute(&self, task: &str, inputs: InputValues) -> Result<ExecutionHandle> {
        let definition = self
            .inner
            .registry
            .get(task)
            .cloned()
            .ok_or_else(|| TaskweaveError::TaskNotFound(task.to_string()))?;

        let token = CancellationToken::new();
        let id = {
            let mut ledger = self.inner.ledger();
            if ledger.is_running(task) {
                return Err(TaskweaveError::AlreadyRunning(task.to_string()));
            }
            ledger.begin(task, None, token.clone())
        };

        info!(task = %task, record = id, "execution requested");

        let (done_tx, done_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let driver_token = token.clone();
        let name = task.to_string();

        tokio::spawn(async move {
            let outcome = run_record(inner, id, definition, Arc::new(inputs), driver_token).await;
            info!(task = %name, record = id, status = %outcome.status, "execution finished");
            if done_tx.send(outcome).is_err() {
                debug!(task = %name, record = id, "execution handle dropped before completion");
            }
        });

        Ok(ExecutionHandle::new(task.to_string(), id, token, done_rx))
    }

    /// Stop every running instance of `task`, including everything running
    /// beneath it if it is a composite.
    pub fn cancel(&self, task: &str) -> Result<()> {
        let tokens = self.inner.ledger().request_cancel(task);
        if tokens.is_empty() {
            return Err(TaskweaveError::NotRunning(task.to_string()));
        }

        info!(task = %task, instances = tokens.len(), "cancellation requested");
        for token in tokens {
            token.cancel();
        }
        Ok(())
    }

    /// Stop one specific execution record.
    pub fn cancel_record(&self, id: RecordId) -> Result<()> {
        let token = self.inner.ledger().request_cancel_record(id);
        match token {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(TaskweaveError::NotRunning(format!("record {id}"))),
        }
    }

    pub fn status(&self, task: &str) -> TaskStatus {
        self.inner.ledger().status(task)
    }

    pub fn list_running(&self) -> BTreeSet<TaskName> {
        self.inner.ledger().running_tasks()
    }

    /// Receive every output line produced from now on.
    pub fn subscribe_output(&self) -> mpsc::UnboundedReceiver<OutputLine> {
        self.inner.output.subscribe()
    }

    /// Snapshot of every record created so far, oldest first.
    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.inner.ledger().records().to_vec()
    }

    pub fn record(&self, id: RecordId) -> Option<ExecutionRecord> {
        self.inner.ledger().get(id).cloned()
    }

    pub fn summary(&self, id: RecordId) -> Option<ExecutionSummary> {
        let ledger = self.inner.ledger();
        let record = ledger.get(id)?;
        Some(ExecutionSummary::build(record, |child| ledger.get(child)))
    }
}
