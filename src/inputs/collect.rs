// src/inputs/collect.rs

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::debug;

use crate::inputs::InputValues;
use crate::inputs::resolver::find_referenced_inputs;
use crate::registry::{Task, TaskRegistry};

/// Lookup and storage of values remembered from earlier invocations.
///
/// The engine never persists anything itself; hosts plug in whatever store
/// they have.
pub trait PreviousValues: Send + Sync {
    fn previous(&self, input: &str) -> Option<String>;
    fn save(&self, input: &str, value: &str);
}

/// Process-lifetime store of remembered values.
#[derive(Debug, Default)]
pub struct MemoryValues {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryValues {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreviousValues for MemoryValues {
    fn previous(&self, input: &str) -> Option<String> {
        let guard = self.values.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(input).cloned()
    }

    fn save(&self, input: &str, value: &str) {
        let mut guard = self.values.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(input.to_string(), value.to_string());
    }
}

/// Result of [`collect_inputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedInputs {
    pub values: InputValues,
    /// Referenced inputs no source could supply, in prompt order.
    pub missing: Vec<String>,
}

impl CollectedInputs {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Fill values for every input `task` references, in resolver order.
///
/// Sources, first match wins: `provided`, then `previous`, then the input's
/// declared default. Remembered values a `select` input no longer offers are
/// ignored. Values in `provided` for inputs the task does not reference are
/// carried through untouched.
pub fn collect_inputs(
    task: &Task,
    registry: &TaskRegistry,
    provided: &InputValues,
    previous: &dyn PreviousValues,
) -> CollectedInputs {
    let mut collected = CollectedInputs {
        values: provided.clone(),
        missing: Vec::new(),
    };

    for name in find_referenced_inputs(task, registry) {
        if provided.contains_key(&name) {
            continue;
        }

        let definition = registry.input(&name);
        let remembered = previous
            .previous(&name)
            .filter(|v| definition.is_none_or(|d| d.accepts(v)));
        let value = remembered.or_else(|| definition.and_then(|d| d.default.clone()));

        match value {
            Some(v) => {
                debug!(task = %task.name, input = %name, "input value filled without prompting");
                collected.values.insert(name, v);
            }
            None => collected.missing.push(name),
        }
    }

    collected
}
