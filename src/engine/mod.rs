// src/engine/mod.rs

//! Execution engine for taskweave.
//!
//! This module ties together:
//! - the task registry (what can run)
//! - variable substitution (what exactly runs)
//! - the process backend (how it runs)
//! - the ledger (what is running, and what ran)
//!
//! The synchronous state lives in [`ledger`]; the async recursion over simple
//! and composite tasks is in [`driver`]; the public API is [`Engine`] in
//! [`runtime`].

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Identifier of one execution record (index into the history).
pub type RecordId = usize;

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Substituted for `${workspaceFolder}`, and the default working
    /// directory of simple tasks.
    pub workspace_root: String,
    /// Admission limit for parallel composites without their own limit.
    pub parallel_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            workspace_root: ".".to_string(),
            parallel_limit: 4,
        }
    }
}

mod driver;
pub mod handle;
pub mod ledger;
pub mod runtime;

pub use handle::{ChildSummary, ExecutionHandle, ExecutionOutcome, ExecutionSummary};
pub use ledger::{Completion, ExecutionRecord, Ledger};
pub use runtime::Engine;
