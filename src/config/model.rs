// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{ExecutionMode, InputKind};

/// Top-level configuration exactly as deserialized from TOML.
///
/// ```toml
/// [config]
/// parallel_limit = 4
///
/// [input.profile]
/// type = "select"
/// options = ["debug", "release"]
///
/// [task.build]
/// cmd = "cargo build --profile ${input:profile}"
///
/// [task.ci]
/// subtasks = ["build", "test"]
/// mode = "serial"
/// ```
///
/// Nothing here is validated yet; see [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Input definitions from `[input.<name>]`.
    #[serde(default)]
    pub input: BTreeMap<String, InputConfig>,

    /// Task definitions from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holders can rely on
/// every task being well-formed and the composite graph being acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub input: BTreeMap<String, InputConfig>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        input: BTreeMap<String, InputConfig>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            input,
            task,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Default admission limit for parallel composites.
    #[serde(default = "default_parallel_limit")]
    pub parallel_limit: usize,

    /// Value of `${workspaceFolder}`.
    ///
    /// Relative paths are resolved against the config file's directory. If
    /// `None`, the config file's directory itself is used.
    #[serde(default)]
    pub workspace_root: Option<String>,
}

fn default_parallel_limit() -> usize {
    4
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            parallel_limit: default_parallel_limit(),
            workspace_root: None,
        }
    }
}

/// `[input.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputConfig {
    #[serde(default, rename = "type")]
    pub kind: InputKind,

    /// Question shown by whatever collects the value.
    #[serde(default)]
    pub prompt: Option<String>,

    /// Allowed values for `type = "select"`.
    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub default: Option<String>,
}

/// `[task.<name>]` section.
///
/// A task is either simple (`cmd` set) or composite (`subtasks` set); the
/// remaining fields only make sense for one of the two kinds and validation
/// rejects mixing them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    /// Command template for a simple task.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Working-directory template for a simple task.
    #[serde(default)]
    pub cwd: Option<String>,

    /// Environment templates for a simple task. Keys are used verbatim.
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,

    /// Ordered subtask names for a composite task.
    #[serde(default)]
    pub subtasks: Option<Vec<String>>,

    #[serde(default)]
    pub mode: Option<ExecutionMode>,

    /// Serial composites only; defaults to `true`.
    #[serde(default)]
    pub stop_on_error: Option<bool>,

    /// Per-composite override of `[config].parallel_limit`.
    #[serde(default)]
    pub parallel_limit: Option<usize>,

    /// Explicit prompt order for `${input:...}` references.
    #[serde(default)]
    pub input_order: Option<Vec<String>>,
}

impl TaskConfig {
    pub fn is_composite(&self) -> bool {
        self.subtasks.is_some()
    }

    pub fn effective_stop_on_error(&self) -> bool {
        self.stop_on_error.unwrap_or(true)
    }

    pub fn effective_mode(&self) -> ExecutionMode {
        self.mode.unwrap_or_default()
    }
}
