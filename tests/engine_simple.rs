// tests/engine_simple.rs

use std::error::Error;
use std::path::PathBuf;

use tokio::sync::oneshot;

use taskweave::errors::TaskweaveError;
use taskweave::exec::OutputStream;
use taskweave::inputs::InputValues;
use taskweave::types::{FailureReason, TaskStatus};
use taskweave_test_utils::builders::{RegistryBuilder, TaskBuilder};
use taskweave_test_utils::fake_backend::{FakeBackend, FakeProcess};
use taskweave_test_utils::{fake_engine, init_tracing, wait_until, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn values(pairs: &[(&str, &str)]) -> InputValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn zero_exit_code_is_success() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new();
    let engine = fake_engine(RegistryBuilder::new().with_simple("ok", "true").build(), &backend, 4);

    let outcome = with_timeout(engine.execute("ok", InputValues::new())?.wait()).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.success());
    assert_eq!(engine.status("ok"), TaskStatus::Success);
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_code_is_failure() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new().script("bad", FakeProcess::exit(2));
    let engine = fake_engine(RegistryBuilder::new().with_simple("bad", "false").build(), &backend, 4);

    let outcome = with_timeout(engine.execute("bad", InputValues::new())?.wait()).await;

    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.exit_code, Some(2));
    assert_eq!(outcome.failure, Some(FailureReason::ExitCode(2)));
    assert_eq!(engine.status("bad"), TaskStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn status_tracks_running_then_terminal() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new().script("srv", FakeProcess::gated());
    let engine = fake_engine(RegistryBuilder::new().with_simple("srv", "serve").build(), &backend, 4);

    assert_eq!(engine.status("srv"), TaskStatus::Idle);

    let handle = engine.execute("srv", InputValues::new())?;
    assert_eq!(engine.status("srv"), TaskStatus::Running);
    assert!(engine.list_running().contains("srv"));

    wait_until(|| backend.active() == 1).await;
    backend.release("srv");

    let outcome = with_timeout(handle.wait()).await;
    assert_eq!(outcome.status, TaskStatus::Success);
    assert!(engine.list_running().is_empty());

    let record = engine.record(outcome.record).expect("record exists");
    assert!(record.ended_at.is_some());
    assert!(record.duration().is_some());
    Ok(())
}

#[tokio::test]
async fn command_cwd_and_env_are_substituted() -> TestResult {
    init_tracing();

    let registry = RegistryBuilder::new()
        .with_task(
            TaskBuilder::simple("build", "make ${input:target} -C ${workspaceFolder}")
                .cwd("${workspaceFolder}/sub")
                .env("OUT", "${input:target}.log")
                .env("${input:target}", "literal-key")
                .build(),
        )
        .with_simple("plain", "echo ${input:unset}done")
        .build();
    let backend = FakeBackend::new();
    let engine = fake_engine(registry, &backend, 4);

    let handle = engine.execute("build", values(&[("target", "all")]))?;
    let record = handle.record_id();
    with_timeout(handle.wait()).await;
    with_timeout(engine.execute("plain", InputValues::new())?.wait()).await;

    let specs = backend.specs();
    assert_eq!(specs.len(), 2);

    assert_eq!(specs[0].command, "make all -C /ws");
    assert_eq!(specs[0].cwd, PathBuf::from("/ws/sub"));
    assert_eq!(specs[0].env.get("OUT").map(String::as_str), Some("all.log"));
    assert_eq!(
        specs[0].env.get("${input:target}").map(String::as_str),
        Some("literal-key")
    );

    // Missing input -> empty string; no cwd -> workspace root.
    assert_eq!(specs[1].command, "echo done");
    assert_eq!(specs[1].cwd, PathBuf::from("/ws"));

    assert_eq!(
        engine.record(record).and_then(|r| r.command).as_deref(),
        Some("make all -C /ws")
    );
    Ok(())
}

#[tokio::test]
async fn spawn_failure_is_a_failed_run_not_an_error() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new().unspawnable("ghost-bin");
    let engine = fake_engine(
        RegistryBuilder::new().with_simple("ghost-bin", "/no/such/program").build(),
        &backend,
        4,
    );

    let outcome = with_timeout(engine.execute("ghost-bin", InputValues::new())?.wait()).await;

    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.exit_code, None);
    assert!(matches!(outcome.failure, Some(FailureReason::SpawnFailed(_))));
    assert!(engine.list_running().is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_task_is_rejected_synchronously() {
    init_tracing();

    let backend = FakeBackend::new();
    let engine = fake_engine(RegistryBuilder::new().with_simple("a", "true").build(), &backend, 4);

    let err = engine.execute("nope", InputValues::new()).unwrap_err();
    assert!(matches!(err, TaskweaveError::TaskNotFound(name) if name == "nope"));
    assert!(engine.history().is_empty());
}

#[tokio::test]
async fn second_execute_of_running_task_is_rejected() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new().script("srv", FakeProcess::gated());
    let engine = fake_engine(RegistryBuilder::new().with_simple("srv", "serve").build(), &backend, 4);

    let handle = engine.execute("srv", InputValues::new())?;
    let err = engine.execute("srv", InputValues::new()).unwrap_err();
    assert!(matches!(err, TaskweaveError::AlreadyRunning(_)));

    backend.release("srv");
    with_timeout(handle.wait()).await;

    // Finished tasks can be run again.
    backend.release("srv");
    let again = with_timeout(engine.execute("srv", InputValues::new())?.wait()).await;
    assert_eq!(again.status, TaskStatus::Success);
    assert_eq!(engine.history().len(), 2);
    Ok(())
}

#[tokio::test]
async fn output_lines_reach_subscribers() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new().script(
        "talk",
        FakeProcess::default().with_output("hello").with_output("world"),
    );
    let engine = fake_engine(RegistryBuilder::new().with_simple("talk", "talk").build(), &backend, 4);
    let mut output = engine.subscribe_output();

    let outcome = with_timeout(engine.execute("talk", InputValues::new())?.wait()).await;

    let first = output.try_recv()?;
    let second = output.try_recv()?;
    assert_eq!(first.line, "hello");
    assert_eq!(second.line, "world");
    assert_eq!(first.task, "talk");
    assert_eq!(first.record, outcome.record);
    assert_eq!(first.stream, OutputStream::Stdout);
    Ok(())
}

#[tokio::test]
async fn completion_callback_fires_once_with_outcome() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new().script("bad", FakeProcess::exit(7));
    let engine = fake_engine(RegistryBuilder::new().with_simple("bad", "false").build(), &backend, 4);

    let (tx, rx) = oneshot::channel();
    engine
        .execute("bad", InputValues::new())?
        .on_complete(move |outcome| {
            let _ = tx.send((outcome.success(), outcome.exit_code));
        });

    let (success, code) = with_timeout(rx).await?;
    assert!(!success);
    assert_eq!(code, Some(7));
    Ok(())
}
