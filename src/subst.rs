// src/subst.rs

//! Variable substitution for command, cwd and env templates.
//!
//! Two placeholder forms are recognised:
//! - `${workspaceFolder}`: the workspace root path.
//! - `${input:<name>}`: the collected value for input `<name>`, or the empty
//!   string when no value was supplied.
//!
//! Substitution never fails and never mutates its arguments.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::inputs::InputValues;

pub const WORKSPACE_FOLDER: &str = "${workspaceFolder}";

static INPUT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{input:([^}]*)\}").expect("input token regex is valid")
});

/// Replace the workspace placeholder, then every `${input:<name>}` token.
pub fn substitute(template: &str, inputs: &InputValues, workspace_root: &str) -> String {
    let with_root = template.replace(WORKSPACE_FOLDER, workspace_root);

    INPUT_TOKEN
        .replace_all(&with_root, |caps: &Captures<'_>| {
            inputs.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Substitute every value of an environment mapping. Keys are kept verbatim.
pub fn substitute_env(
    env: &BTreeMap<String, String>,
    inputs: &InputValues,
    workspace_root: &str,
) -> BTreeMap<String, String> {
    env.iter()
        .map(|(k, v)| (k.clone(), substitute(v, inputs, workspace_root)))
        .collect()
}

/// Input names referenced by `template`, in order of appearance (repeats kept).
pub fn input_references(template: &str) -> impl Iterator<Item = &str> {
    INPUT_TOKEN
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(pairs: &[(&str, &str)]) -> InputValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_workspace_and_inputs() {
        let out = substitute(
            "cd ${workspaceFolder}/app && make ${input:target} ${input:target}",
            &values(&[("target", "all")]),
            "/work",
        );
        assert_eq!(out, "cd /work/app && make all all");
    }

    #[test]
    fn unknown_input_becomes_empty() {
        let out = substitute("run --flag=${input:missing}!", &InputValues::new(), "/w");
        assert_eq!(out, "run --flag=!");
    }

    #[test]
    fn env_keys_are_not_substituted() {
        let mut env = BTreeMap::new();
        env.insert("${input:k}".to_string(), "${input:k}".to_string());
        let out = substitute_env(&env, &values(&[("k", "v")]), "/w");
        assert_eq!(out.get("${input:k}").map(String::as_str), Some("v"));
    }

    #[test]
    fn references_are_listed_in_order() {
        let refs: Vec<_> =
            input_references("${input:b} ${workspaceFolder} ${input:a} ${input:b}").collect();
        assert_eq!(refs, vec!["b", "a", "b"]);
    }

    proptest! {
        #[test]
        fn placeholder_free_text_is_unchanged(s in "[a-zA-Z0-9 ./_=-]{0,64}") {
            let out = substitute(&s, &values(&[("x", "y")]), "/root");
            prop_assert_eq!(out, s);
        }

        #[test]
        fn substitution_is_idempotent(
            prefix in "[a-z ]{0,16}",
            value in "[a-z0-9]{0,16}",
        ) {
            let inputs = values(&[("x", value.as_str())]);
            let template = format!("{prefix}${{input:x}} ${{workspaceFolder}} ${{input:nope}}");
            let once = substitute(&template, &inputs, "/ws");
            let twice = substitute(&once, &inputs, "/ws");
            prop_assert_eq!(once, twice);
        }
    }
}
