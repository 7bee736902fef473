// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{ConfigFile, InputConfig, RawConfigFile, TaskConfig};
use crate::errors::{Result, TaskweaveError};
use crate::types::InputKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskweaveError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.input, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    for (name, input) in cfg.input.iter() {
        validate_input(name, input)?;
    }
    for (name, task) in cfg.task.iter() {
        validate_task_shape(name, task)?;
    }
    warn_unknown_subtasks(cfg);
    check_acyclic(
        cfg.task
            .iter()
            .filter_map(|(name, task)| Some((name.as_str(), task.subtasks.as_deref()?))),
    )?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskweaveError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.parallel_limit == 0 {
        return Err(TaskweaveError::ConfigError(
            "[config].parallel_limit must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_input(name: &str, input: &InputConfig) -> Result<()> {
    if input.kind != InputKind::Select {
        return Ok(());
    }
    if input.options.is_empty() {
        return Err(TaskweaveError::ConfigError(format!(
            "input '{name}' has type \"select\" but no `options`"
        )));
    }
    if let Some(ref default) = input.default {
        if !input.options.contains(default) {
            return Err(TaskweaveError::ConfigError(format!(
                "input '{name}' default '{default}' is not one of its options"
            )));
        }
    }
    Ok(())
}

fn validate_task_shape(name: &str, task: &TaskConfig) -> Result<()> {
    let malformed = |msg: &str| {
        Err(TaskweaveError::ConfigError(format!("task '{name}' {msg}")))
    };

    match (&task.cmd, &task.subtasks) {
        (None, None) => return malformed("must define either `cmd` or `subtasks`"),
        (Some(_), Some(_)) => return malformed("cannot define both `cmd` and `subtasks`"),
        (Some(cmd), None) => {
            if cmd.trim().is_empty() {
                return malformed("has an empty `cmd`");
            }
            if task.mode.is_some()
                || task.stop_on_error.is_some()
                || task.parallel_limit.is_some()
            {
                return malformed(
                    "sets `mode`, `stop_on_error` or `parallel_limit` but is not a composite",
                );
            }
        }
        (None, Some(subtasks)) => {
            if subtasks.is_empty() {
                return malformed("has an empty `subtasks` list");
            }
            if subtasks.iter().any(|s| s == name) {
                return malformed("cannot contain itself in `subtasks`");
            }
            if task.cwd.is_some() || task.env.is_some() {
                return malformed("sets `cwd` or `env` but is a composite");
            }
            if task.parallel_limit == Some(0) {
                return malformed("has `parallel_limit = 0` (must be >= 1)");
            }
        }
    }
    Ok(())
}

/// Dangling subtask references only fail their own slot at run time, so they
/// are reported here without rejecting the config.
fn warn_unknown_subtasks(cfg: &RawConfigFile) {
    for (name, task) in cfg.task.iter() {
        for sub in task.subtasks.iter().flatten() {
            if !cfg.task.contains_key(sub) {
                warn!(
                    task = %name,
                    subtask = %sub,
                    "composite references unknown subtask; that slot will fail when run"
                );
            }
        }
    }
}

/// Reject composite reference cycles.
///
/// Each item is a composite name and its subtask list. Edge direction is
/// composite -> subtask; unknown subtask names are still added as nodes but
/// can never close a cycle.
pub fn check_acyclic<'a>(
    composites: impl IntoIterator<Item = (&'a str, &'a [String])>,
) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for (name, subtasks) in composites {
        graph.add_node(name);
        for sub in subtasks {
            graph.add_edge(name, sub.as_str(), ());
        }
    }

    // A topological sort fails on any cycle, self-loops included.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskweaveError::CompositeCycle(format!(
            "composite task '{}' transitively contains itself",
            cycle.node_id()
        ))),
    }
}
