// tests/config_to_engine.rs

use std::error::Error;
use std::fs;

use tempfile::tempdir;

use taskweave::config::{load_and_validate, load_from_str};
use taskweave::errors::TaskweaveError;
use taskweave::inputs::{InputValues, MemoryValues, collect_inputs, find_referenced_inputs};
use taskweave::registry::TaskRegistry;
use taskweave::types::{ExecutionMode, InputKind, TaskStatus};
use taskweave_test_utils::fake_backend::{FakeBackend, FakeProcess};
use taskweave_test_utils::{fake_engine, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const TASKS: &str = r#"
[config]
parallel_limit = 2

[input.profile]
type = "select"
prompt = "Build profile"
options = ["debug", "release"]
default = "debug"

[input.target]
prompt = "Deploy target"

[task.build]
cmd = "cargo build --profile ${input:profile}"

[task.test]
cmd = "cargo test"
env = { RUST_LOG = "${input:profile}" }

[task.deploy]
cmd = "./deploy.sh ${input:target}"
cwd = "${workspaceFolder}/ops"

[task.ci]
subtasks = ["build", "test", "deploy"]
mode = "serial"
input_order = ["target", "profile"]

[task.checks]
subtasks = ["build", "test"]
mode = "parallel"
stop_on_error = false
"#;

#[test]
fn config_file_loads_from_disk() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Taskweave.toml");
    fs::write(&path, TASKS)?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.config.parallel_limit, 2);
    assert_eq!(cfg.task.len(), 5);
    assert_eq!(cfg.input["profile"].kind, InputKind::Select);

    let registry = TaskRegistry::from_config(&cfg)?;
    let ci = registry.get("ci").expect("ci task");
    assert!(ci.is_composite());
    assert_eq!(ci.subtasks(), ["build", "test", "deploy"]);

    let checks = registry.get("checks").expect("checks task");
    match &checks.kind {
        taskweave::registry::TaskKind::Composite(c) => {
            assert_eq!(c.mode, ExecutionMode::Parallel);
            assert!(!c.stop_on_error);
        }
        other => panic!("expected composite, got {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempdir().expect("tempdir");
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, TaskweaveError::IoError(_)));
}

#[test]
fn malformed_toml_is_reported() {
    let err = load_from_str("[task.a\ncmd = 1").unwrap_err();
    assert!(matches!(err, TaskweaveError::TomlError(_)));
}

#[test]
fn composite_inputs_follow_explicit_order() -> TestResult {
    let registry = TaskRegistry::from_config(&load_from_str(TASKS)?)?;

    let ci = registry.get("ci").expect("ci task");
    assert_eq!(find_referenced_inputs(ci, &registry), vec!["target", "profile"]);

    let checks = registry.get("checks").expect("checks task");
    assert_eq!(find_referenced_inputs(checks, &registry), vec!["profile"]);
    Ok(())
}

#[test]
fn defaults_fill_in_but_free_text_inputs_must_be_given() -> TestResult {
    let registry = TaskRegistry::from_config(&load_from_str(TASKS)?)?;
    let ci = registry.get("ci").expect("ci task");

    let collected = collect_inputs(ci, &registry, &InputValues::new(), &MemoryValues::new());
    assert!(!collected.is_complete());
    assert_eq!(collected.missing, vec!["target"]);
    assert_eq!(collected.values.get("profile").map(String::as_str), Some("debug"));
    Ok(())
}

#[tokio::test]
async fn loaded_tasks_run_end_to_end() -> TestResult {
    init_tracing();

    let registry = TaskRegistry::from_config(&load_from_str(TASKS)?)?;
    let backend = FakeBackend::new().script("test", FakeProcess::exit(101));
    let engine = fake_engine(registry, &backend, 2);

    let provided: InputValues = [("target".to_string(), "staging".to_string())]
        .into_iter()
        .collect();
    let inputs = {
        let ci = engine.registry().get("ci").expect("ci task");
        collect_inputs(ci, engine.registry(), &provided, &MemoryValues::new()).values
    };

    let outcome = with_timeout(engine.execute("ci", inputs)?.wait()).await;
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(backend.launched(), vec!["build", "test"]);
    assert_eq!(engine.status("deploy"), TaskStatus::Idle);

    let specs = backend.specs();
    assert_eq!(specs[0].command, "cargo build --profile debug");
    assert_eq!(specs[1].env.get("RUST_LOG").map(String::as_str), Some("debug"));
    Ok(())
}
