// src/engine/driver.rs

//! Recursive execution of simple and composite tasks.
//!
//! Every record is finalized by exactly one code path: the driver future that
//! owns it, after all of its own work (and, for composites, all launched
//! children) has reached a terminal state. Parallel children report back to
//! their parent through a `JoinSet`, so no child ever decides whether it was
//! "the last one".

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::handle::ExecutionOutcome;
use crate::engine::ledger::Completion;
use crate::engine::runtime::EngineInner;
use crate::engine::{RecordId, TaskName};
use crate::exec::{OutputSink, ProcessBackend, ProcessSpec};
use crate::inputs::InputValues;
use crate::registry::{CompositeTask, SimpleTask, Task, TaskKind};
use crate::subst::{substitute, substitute_env};
use crate::types::{ExecutionMode, FailureReason, TaskStatus};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Drive record `id` (already `Running` in the ledger) to a terminal state.
pub(crate) fn run_record<B: ProcessBackend>(
    inner: Arc<EngineInner<B>>,
    id: RecordId,
    task: Task,
    inputs: Arc<InputValues>,
    token: CancellationToken,
) -> BoxFuture<ExecutionOutcome> {
    Box::pin(async move {
        let completion = match &task.kind {
            TaskKind::Simple(simple) => {
                run_simple(&inner, id, &task.name, simple, &inputs, &token).await
            }
            TaskKind::Composite(composite) => match composite.mode {
                ExecutionMode::Serial => {
                    run_serial(&inner, id, composite, &inputs, &token).await
                }
                ExecutionMode::Parallel => {
                    run_parallel(&inner, id, composite, &inputs, &token).await
                }
            },
        };
        finish(&inner, id, &task.name, completion)
    })
}

fn finish<B: ProcessBackend>(
    inner: &EngineInner<B>,
    id: RecordId,
    task: &str,
    completion: Completion,
) -> ExecutionOutcome {
    if !inner.ledger().finish(id, completion.clone()) {
        warn!(task = %task, record = id, "record was already terminal; keeping first status");
    }

    match completion.failure {
        Some(ref reason) => warn!(task = %task, record = id, %reason, "task failed"),
        None => info!(task = %task, record = id, status = %completion.status, "task finished"),
    }

    ExecutionOutcome::from_completion(id, &completion)
}

async fn run_simple<B: ProcessBackend>(
    inner: &EngineInner<B>,
    id: RecordId,
    name: &str,
    simple: &SimpleTask,
    inputs: &InputValues,
    token: &CancellationToken,
) -> Completion {
    if token.is_cancelled() {
        return stopped(None);
    }

    let root = inner.options.workspace_root.as_str();
    let command = substitute(&simple.command, inputs, root);
    let cwd = match simple.cwd.as_deref() {
        Some(template) => Path::new(root).join(substitute(template, inputs, root)),
        None => Path::new(root).to_path_buf(),
    };
    let env = substitute_env(&simple.env, inputs, root);

    inner.ledger().set_command(id, &command);

    let spec = ProcessSpec {
        task: name.to_string(),
        record: id,
        command,
        cwd,
        env,
    };
    let sink = OutputSink::new(name.to_string(), id, inner.output.clone());

    let mut handle = match inner.backend.spawn(spec, sink) {
        Ok(handle) => handle,
        Err(e) => {
            error!(task = %name, record = id, error = %e, "could not start process");
            return Completion {
                status: TaskStatus::Failed,
                exit_code: None,
                failure: Some(FailureReason::SpawnFailed(e.to_string())),
            };
        }
    };

    let exit = tokio::select! {
        exit = handle.wait() => exit,
        _ = token.cancelled() => {
            debug!(task = %name, record = id, "forwarding cancellation to process");
            handle.cancel();
            handle.wait().await
        }
    };

    // A requested stop wins over whatever exit code the process produced.
    if token.is_cancelled() || exit.cancelled {
        return stopped(exit.code);
    }

    match exit.code {
        Some(0) => Completion {
            status: TaskStatus::Success,
            exit_code: Some(0),
            failure: None,
        },
        code => {
            let code = code.unwrap_or(-1);
            Completion {
                status: TaskStatus::Failed,
                exit_code: Some(code),
                failure: Some(FailureReason::ExitCode(code)),
            }
        }
    }
}

async fn run_serial<B: ProcessBackend>(
    inner: &Arc<EngineInner<B>>,
    id: RecordId,
    composite: &CompositeTask,
    inputs: &Arc<InputValues>,
    token: &CancellationToken,
) -> Completion {
    let subtasks = &composite.subtasks;
    let mut failed = Vec::new();
    let mut child_stopped = false;

    for (idx, name) in subtasks.iter().enumerate() {
        if token.is_cancelled() {
            skip(inner, id, &subtasks[idx..]);
            break;
        }

        let outcome = launch_child(inner, id, name, inputs, token).await;

        match outcome.status {
            TaskStatus::Failed => {
                failed.push(name.clone());
                if composite.stop_on_error {
                    debug!(record = id, subtask = %name, "stop_on_error: skipping remaining subtasks");
                    skip(inner, id, &subtasks[idx + 1..]);
                    break;
                }
            }
            TaskStatus::Stopped => {
                child_stopped = true;
                skip(inner, id, &subtasks[idx + 1..]);
                break;
            }
            _ => {}
        }
    }

    aggregate(token, failed, child_stopped)
}

async fn run_parallel<B: ProcessBackend>(
    inner: &Arc<EngineInner<B>>,
    id: RecordId,
    composite: &CompositeTask,
    inputs: &Arc<InputValues>,
    token: &CancellationToken,
) -> Completion {
    let subtasks = &composite.subtasks;
    let limit = composite
        .parallel_limit
        .unwrap_or(inner.options.parallel_limit)
        .max(1);
    debug!(record = id, limit, count = subtasks.len(), "starting parallel composite");

    // Fair semaphore + in-order acquisition = first declared, first admitted.
    let gate = Arc::new(Semaphore::new(limit));
    let mut joins: JoinSet<(usize, ExecutionOutcome)> = JoinSet::new();
    let mut outcomes: Vec<(usize, ExecutionOutcome)> = Vec::with_capacity(subtasks.len());
    let mut lost = false;

    for (idx, name) in subtasks.iter().enumerate() {
        if token.is_cancelled() {
            skip(inner, id, &subtasks[idx..]);
            break;
        }

        if !inner.registry.contains(name) {
            // Fails on the spot; never occupies a running slot.
            outcomes.push((idx, launch_child(inner, id, name, inputs, token).await));
            continue;
        }

        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            permit = Arc::clone(&gate).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            skip(inner, id, &subtasks[idx..]);
            break;
        };

        let child = launch_child(inner, id, name, inputs, token);
        joins.spawn(async move {
            let outcome = child.await;
            // Release the slot only after the child's record is terminal.
            drop(permit);
            (idx, outcome)
        });
    }

    while let Some(joined) = joins.join_next().await {
        match joined {
            Ok(pair) => outcomes.push(pair),
            Err(e) => {
                error!(record = id, error = %e, "subtask driver did not complete");
                lost = true;
            }
        }
    }

    outcomes.sort_by_key(|(idx, _)| *idx);
    let mut failed: Vec<TaskName> = outcomes
        .iter()
        .filter(|(_, o)| o.status == TaskStatus::Failed)
        .map(|(idx, _)| subtasks[*idx].clone())
        .collect();
    if lost {
        failed.push("<lost subtask>".to_string());
    }
    let child_stopped = outcomes.iter().any(|(_, o)| o.status == TaskStatus::Stopped);

    aggregate(token, failed, child_stopped)
}

/// Create the child record and return the future that drives it.
///
/// A name missing from the registry yields an already-failed record.
fn launch_child<B: ProcessBackend>(
    inner: &Arc<EngineInner<B>>,
    parent: RecordId,
    name: &str,
    inputs: &Arc<InputValues>,
    parent_token: &CancellationToken,
) -> BoxFuture<ExecutionOutcome> {
    let token = parent_token.child_token();
    let task = inner.registry.get(name).cloned();
    let id = inner.ledger().begin(name, Some(parent), token.clone());

    match task {
        Some(task) => {
            debug!(parent, record = id, subtask = %name, "launching subtask");
            run_record(Arc::clone(inner), id, task, Arc::clone(inputs), token)
        }
        None => {
            let outcome = finish(
                inner,
                id,
                name,
                Completion {
                    status: TaskStatus::Failed,
                    exit_code: None,
                    failure: Some(FailureReason::SubtaskNotFound(name.to_string())),
                },
            );
            Box::pin(std::future::ready(outcome))
        }
    }
}

fn skip<B: ProcessBackend>(inner: &EngineInner<B>, id: RecordId, rest: &[TaskName]) {
    if rest.is_empty() {
        return;
    }
    debug!(record = id, skipped = ?rest, "subtasks not run");
    inner.ledger().mark_skipped(id, rest.iter().cloned());
}

/// Composite result: own cancellation first, then any failure, then any
/// child stopped on its own, else success.
fn aggregate(token: &CancellationToken, failed: Vec<TaskName>, child_stopped: bool) -> Completion {
    if token.is_cancelled() {
        return stopped(None);
    }
    if !failed.is_empty() {
        return Completion {
            status: TaskStatus::Failed,
            exit_code: None,
            failure: Some(FailureReason::SubtaskFailed(failed)),
        };
    }
    if child_stopped {
        return stopped(None);
    }
    Completion {
        status: TaskStatus::Success,
        exit_code: None,
        failure: None,
    }
}

fn stopped(exit_code: Option<i32>) -> Completion {
    Completion {
        status: TaskStatus::Stopped,
        exit_code,
        failure: None,
    }
}
