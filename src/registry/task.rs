// src/registry/task.rs

//! Task definitions as the engine sees them.

use std::collections::BTreeMap;

use crate::config::model::TaskConfig;
use crate::engine::TaskName;
use crate::types::ExecutionMode;

/// A named, runnable task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: TaskName,
    pub kind: TaskKind,
    /// Explicit prompt order for the inputs this task references.
    pub input_order: Option<Vec<String>>,
}

/// What running a task means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Simple(SimpleTask),
    Composite(CompositeTask),
}

/// A single external command.
///
/// `command`, `cwd` and the values of `env` are templates; see
/// [`crate::subst`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTask {
    pub command: String,
    pub cwd: Option<String>,
    /// Sorted by key, which is also the order the input resolver scans values in.
    pub env: BTreeMap<String, String>,
}

/// An ordered or concurrent group of other tasks, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeTask {
    pub mode: ExecutionMode,
    /// Only honoured in serial mode.
    pub stop_on_error: bool,
    pub subtasks: Vec<TaskName>,
    /// Overrides the engine-wide parallelism limit for this composite.
    pub parallel_limit: Option<usize>,
}

impl Task {
    pub fn simple(name: impl Into<TaskName>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Simple(SimpleTask {
                command: command.into(),
                cwd: None,
                env: BTreeMap::new(),
            }),
            input_order: None,
        }
    }

    pub fn composite(
        name: impl Into<TaskName>,
        mode: ExecutionMode,
        subtasks: impl IntoIterator<Item = impl Into<TaskName>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Composite(CompositeTask {
                mode,
                stop_on_error: true,
                subtasks: subtasks.into_iter().map(Into::into).collect(),
                parallel_limit: None,
            }),
            input_order: None,
        }
    }

    /// Build from a validated `[task.<name>]` section.
    pub fn from_config(name: TaskName, cfg: &TaskConfig) -> Self {
        let kind = match (&cfg.cmd, &cfg.subtasks) {
            (_, Some(subtasks)) => TaskKind::Composite(CompositeTask {
                mode: cfg.effective_mode(),
                stop_on_error: cfg.effective_stop_on_error(),
                subtasks: subtasks.clone(),
                parallel_limit: cfg.parallel_limit,
            }),
            (cmd, None) => TaskKind::Simple(SimpleTask {
                command: cmd.clone().unwrap_or_default(),
                cwd: cfg.cwd.clone(),
                env: cfg.env.clone().unwrap_or_default(),
            }),
        };

        Self {
            name,
            kind,
            input_order: cfg.input_order.clone(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, TaskKind::Composite(_))
    }

    pub fn subtasks(&self) -> &[TaskName] {
        match &self.kind {
            TaskKind::Composite(c) => &c.subtasks,
            TaskKind::Simple(_) => &[],
        }
    }
}
