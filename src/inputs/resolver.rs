// src/inputs/resolver.rs

use std::collections::HashSet;

use crate::registry::{Task, TaskKind, TaskRegistry};
use crate::subst::input_references;

/// Ordered, de-duplicated list of input names a task references.
///
/// Prompts are asked in exactly this order, so it must be stable across calls
/// on the same definition.
///
/// - With an explicit `input_order`, that order is kept, filtered down to the
///   names actually referenced.
/// - Otherwise names are recorded on first sight while scanning the command,
///   then env values in key order, then cwd.
///
/// Composites gather references from their subtasks in declared order,
/// recursively. Subtask names missing from the registry contribute nothing.
pub fn find_referenced_inputs(task: &Task, registry: &TaskRegistry) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    scan_task(task, registry, &mut seen, &mut ordered);

    match task.input_order {
        Some(ref explicit) => {
            let mut emitted = HashSet::new();
            explicit
                .iter()
                .filter(|name| seen.contains(name.as_str()))
                .filter(|name| emitted.insert(name.as_str()))
                .cloned()
                .collect()
        }
        None => ordered,
    }
}

fn scan_task(
    task: &Task,
    registry: &TaskRegistry,
    seen: &mut HashSet<String>,
    ordered: &mut Vec<String>,
) {
    match &task.kind {
        TaskKind::Simple(simple) => {
            let templates = std::iter::once(simple.command.as_str())
                .chain(simple.env.values().map(String::as_str))
                .chain(simple.cwd.as_deref());

            for template in templates {
                for name in input_references(template) {
                    if seen.insert(name.to_string()) {
                        ordered.push(name.to_string());
                    }
                }
            }
        }
        TaskKind::Composite(composite) => {
            for sub in composite.subtasks.iter() {
                if let Some(child) = registry.get(sub) {
                    scan_task(child, registry, seen, ordered);
                }
            }
        }
    }
}
