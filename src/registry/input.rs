// src/registry/input.rs

use crate::config::model::InputConfig;
use crate::types::InputKind;

/// A named value referenced from templates as `${input:<name>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDefinition {
    pub name: String,
    pub kind: InputKind,
    pub prompt: String,
    /// Non-empty when `kind` is `Select`.
    pub options: Vec<String>,
    pub default: Option<String>,
}

impl InputDefinition {
    pub fn prompt(name: impl Into<String>, default: Option<&str>) -> Self {
        let name = name.into();
        Self {
            prompt: name.clone(),
            name,
            kind: InputKind::Prompt,
            options: Vec::new(),
            default: default.map(str::to_string),
        }
    }

    pub fn from_config(name: String, cfg: &InputConfig) -> Self {
        Self {
            prompt: cfg.prompt.clone().unwrap_or_else(|| name.clone()),
            name,
            kind: cfg.kind,
            options: cfg.options.clone(),
            default: cfg.default.clone(),
        }
    }

    /// Whether `value` is acceptable for this input.
    pub fn accepts(&self, value: &str) -> bool {
        match self.kind {
            InputKind::Prompt => true,
            InputKind::Select => self.options.iter().any(|o| o == value),
        }
    }
}
