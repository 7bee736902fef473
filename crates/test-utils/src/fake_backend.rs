use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use taskweave::errors::{Result, TaskweaveError};
use taskweave::exec::{
    OutputSink, OutputStream, ProcessBackend, ProcessExit, ProcessHandle, ProcessSpec,
};

/// Scripted behaviour of one fake process.
#[derive(Debug, Clone, Default)]
pub struct FakeProcess {
    pub exit_code: i32,
    /// Time the "process" runs before exiting.
    pub delay: Duration,
    /// Lines written to stdout right after start.
    pub output: Vec<String>,
    /// Don't exit until [`FakeBackend::release`] is called (or cancelled).
    pub gated: bool,
}

impl FakeProcess {
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_output(mut self, line: &str) -> Self {
        self.output.push(line.to_string());
        self
    }
}

#[derive(Default)]
struct FakeState {
    scripts: Mutex<HashMap<String, FakeProcess>>,
    unspawnable: Mutex<HashSet<String>>,
    launches: Mutex<Vec<ProcessSpec>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeState {
    fn gate(&self, task: &str) -> Arc<Notify> {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(task.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }
}

/// A process backend that never touches the OS.
///
/// - records every launch (in launch order)
/// - exits each "process" per its [`FakeProcess`] script (default: exit 0
///   immediately)
/// - tracks how many processes are alive at once
///
/// Clones share state, so keep one clone for assertions and hand the other to
/// the engine.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, task: &str, process: FakeProcess) -> Self {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(task.to_string(), process);
        self
    }

    /// Make `spawn` fail for `task`.
    pub fn unspawnable(self, task: &str) -> Self {
        self.state
            .unspawnable
            .lock()
            .unwrap()
            .insert(task.to_string());
        self
    }

    /// Let one gated instance of `task` exit (now, or as soon as it starts).
    pub fn release(&self, task: &str) {
        self.state.gate(task).notify_one();
    }

    /// Task names in launch order.
    pub fn launched(&self) -> Vec<String> {
        self.state
            .launches
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.task.clone())
            .collect()
    }

    pub fn specs(&self) -> Vec<ProcessSpec> {
        self.state.launches.lock().unwrap().clone()
    }

    /// Processes currently alive.
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Highest number of processes ever alive at once.
    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

impl ProcessBackend for FakeBackend {
    fn spawn(&self, spec: ProcessSpec, output: OutputSink) -> Result<ProcessHandle> {
        if self.state.unspawnable.lock().unwrap().contains(&spec.task) {
            return Err(TaskweaveError::Spawn {
                task: spec.task.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
            });
        }

        let script = self
            .state
            .scripts
            .lock()
            .unwrap()
            .get(&spec.task)
            .cloned()
            .unwrap_or_default();
        let gate = self.state.gate(&spec.task);

        self.state.launches.lock().unwrap().push(spec.clone());
        let now = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(now, Ordering::SeqCst);

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel::<ProcessExit>();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            for line in script.output.iter() {
                output.emit(OutputStream::Stdout, line.clone());
            }

            let run = async {
                tokio::time::sleep(script.delay).await;
                if script.gated {
                    gate.notified().await;
                }
            };

            let exit = tokio::select! {
                _ = run => ProcessExit::exited(script.exit_code),
                _ = &mut cancel_rx => ProcessExit { code: None, cancelled: true },
            };

            state.active.fetch_sub(1, Ordering::SeqCst);
            let _ = exit_tx.send(exit);
        });

        Ok(ProcessHandle::new(cancel_tx, exit_rx))
    }
}
