#![allow(dead_code)]

use taskweave::registry::{InputDefinition, Task, TaskKind, TaskRegistry};
use taskweave::types::ExecutionMode;

/// Builder for `TaskRegistry` to simplify test setup.
#[derive(Default)]
pub struct RegistryBuilder {
    tasks: Vec<Task>,
    inputs: Vec<InputDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Shorthand for a simple task whose command is `cmd`.
    pub fn with_simple(self, name: &str, cmd: &str) -> Self {
        self.with_task(Task::simple(name, cmd))
    }

    pub fn with_input(mut self, input: InputDefinition) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry::new(self.tasks, self.inputs).expect("Failed to build valid registry from builder")
    }
}

/// Builder for `Task`.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn simple(name: &str, cmd: &str) -> Self {
        Self {
            task: Task::simple(name, cmd),
        }
    }

    pub fn serial(name: &str, subtasks: &[&str]) -> Self {
        Self {
            task: Task::composite(name, ExecutionMode::Serial, subtasks.iter().copied()),
        }
    }

    pub fn parallel(name: &str, subtasks: &[&str]) -> Self {
        Self {
            task: Task::composite(name, ExecutionMode::Parallel, subtasks.iter().copied()),
        }
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        if let TaskKind::Simple(ref mut simple) = self.task.kind {
            simple.cwd = Some(cwd.to_string());
        }
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        if let TaskKind::Simple(ref mut simple) = self.task.kind {
            simple.env.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn stop_on_error(mut self, val: bool) -> Self {
        if let TaskKind::Composite(ref mut composite) = self.task.kind {
            composite.stop_on_error = val;
        }
        self
    }

    pub fn parallel_limit(mut self, limit: usize) -> Self {
        if let TaskKind::Composite(ref mut composite) = self.task.kind {
            composite.parallel_limit = Some(limit);
        }
        self
    }

    pub fn input_order(mut self, order: &[&str]) -> Self {
        self.task.input_order = Some(order.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}
