// src/registry/mod.rs

//! In-memory task registry.
//!
//! - [`task`] holds the `Task` sum type (simple vs composite).
//! - [`input`] holds input definitions.
//!
//! The registry is read-only once built; the engine shares it behind an `Arc`.

pub mod input;
pub mod task;

use std::collections::BTreeMap;

use crate::config::model::ConfigFile;
use crate::config::validate::check_acyclic;
use crate::errors::{Result, TaskweaveError};

pub use input::InputDefinition;
pub use task::{CompositeTask, SimpleTask, Task, TaskKind};

#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Task>,
    inputs: BTreeMap<String, InputDefinition>,
}

impl TaskRegistry {
    /// Build a registry, rejecting duplicate task/input names and composite
    /// cycles.
    pub fn new(
        tasks: impl IntoIterator<Item = Task>,
        inputs: impl IntoIterator<Item = InputDefinition>,
    ) -> Result<Self> {
        let mut task_map = BTreeMap::new();
        for task in tasks {
            if task_map.contains_key(&task.name) {
                return Err(TaskweaveError::DuplicateTask(task.name));
            }
            task_map.insert(task.name.clone(), task);
        }

        let mut input_map = BTreeMap::new();
        for input in inputs {
            if input_map.contains_key(&input.name) {
                return Err(TaskweaveError::ConfigError(format!(
                    "duplicate input name '{}'",
                    input.name
                )));
            }
            input_map.insert(input.name.clone(), input);
        }

        check_acyclic(
            task_map
                .values()
                .filter(|t| t.is_composite())
                .map(|t| (t.name.as_str(), t.subtasks())),
        )?;

        Ok(Self {
            tasks: task_map,
            inputs: input_map,
        })
    }

    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Self::new(
            cfg.task
                .iter()
                .map(|(name, t)| Task::from_config(name.clone(), t)),
            cfg.input
                .iter()
                .map(|(name, i)| InputDefinition::from_config(name.clone(), i)),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn input(&self, name: &str) -> Option<&InputDefinition> {
        self.inputs.get(name)
    }

    /// Tasks in name order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &InputDefinition> {
        self.inputs.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
