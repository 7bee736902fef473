// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod inputs;
pub mod logging;
pub mod registry;
pub mod subst;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{Engine, EngineOptions, ExecutionOutcome, ExecutionSummary};
use crate::exec::{OutputLine, OutputStream, RealProcessBackend};
use crate::inputs::{InputValues, MemoryValues, collect_inputs, find_referenced_inputs};
use crate::registry::{Task, TaskKind, TaskRegistry};
use crate::subst::{substitute, substitute_env};

/// High-level entry point used by `main.rs`.
///
/// Returns whether the requested command succeeded; a task that ends
/// `failed` or `stopped` is not an error here, just an unsuccessful run.
///
/// This wires together:
/// - config loading
/// - registry construction
/// - input collection
/// - the engine and real process backend
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading task file {}", config_path.display()))?;
    let registry = TaskRegistry::from_config(&cfg)?;

    match args.command {
        Command::List => {
            print_listing(&registry);
            Ok(true)
        }
        Command::Inputs { task } => {
            let task = lookup(&registry, &task)?;
            for name in find_referenced_inputs(task, &registry) {
                println!("{name}");
            }
            Ok(true)
        }
        Command::Run {
            task,
            inputs,
            parallel_limit,
            dry_run,
        } => {
            let options = EngineOptions {
                workspace_root: workspace_root(&cfg, &config_path),
                parallel_limit: parallel_limit
                    .map(usize::from)
                    .unwrap_or(cfg.config.parallel_limit),
            };
            let provided: InputValues = inputs.into_iter().collect();
            run_task(registry, options, &task, provided, dry_run).await
        }
    }
}

async fn run_task(
    registry: TaskRegistry,
    options: EngineOptions,
    name: &str,
    provided: InputValues,
    dry_run: bool,
) -> Result<bool> {
    let task = lookup(&registry, name)?;

    // Nothing is remembered across invocations of the binary.
    let collected = collect_inputs(task, &registry, &provided, &MemoryValues::new());
    if !collected.is_complete() {
        let described: Vec<String> = collected
            .missing
            .iter()
            .map(|input| match registry.input(input) {
                Some(def) => format!("{input} ({})", def.prompt),
                None => input.clone(),
            })
            .collect();
        bail!(
            "task '{name}' needs values for: {} (pass --input NAME=VALUE)",
            described.join(", ")
        );
    }

    if dry_run {
        print_plan(&registry, task, &collected.values, &options.workspace_root, 0);
        debug!("dry-run complete (no execution)");
        return Ok(true);
    }

    let engine = Engine::new(registry, RealProcessBackend::new(), options);
    let mut output = engine.subscribe_output();
    let handle = engine.execute(name, collected.values)?;
    let record = handle.record_id();

    let done = handle.wait();
    tokio::pin!(done);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let outcome: ExecutionOutcome = loop {
        tokio::select! {
            Some(line) = output.recv() => print_output(&line),
            outcome = &mut done => {
                // Process output is fully published before exit is reported.
                while let Ok(line) = output.try_recv() {
                    print_output(&line);
                }
                break outcome;
            }
            res = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match res {
                    Ok(()) => {
                        info!(task = %name, "Ctrl-C received; stopping");
                        if let Err(e) = engine.cancel(name) {
                            debug!(error = %e, "nothing to cancel");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to listen for Ctrl+C"),
                }
            }
        }
    };

    if let Some(summary) = engine.summary(record) {
        print_summary(&summary);
    }
    Ok(outcome.success())
}

fn lookup<'a>(registry: &'a TaskRegistry, name: &str) -> Result<&'a Task> {
    registry
        .get(name)
        .ok_or_else(|| errors::TaskweaveError::TaskNotFound(name.to_string()).into())
}

/// `${workspaceFolder}`: `[config].workspace_root` relative to the task file,
/// or the task file's directory.
fn workspace_root(cfg: &ConfigFile, config_path: &Path) -> String {
    let base = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let root = match cfg.config.workspace_root {
        Some(ref configured) => base.join(configured),
        None => base,
    };
    root.to_string_lossy().into_owned()
}

fn print_output(line: &OutputLine) {
    match line.stream {
        OutputStream::Stdout => println!("[{}] {}", line.task, line.line),
        OutputStream::Stderr => eprintln!("[{}] {}", line.task, line.line),
    }
}

fn print_summary(summary: &ExecutionSummary) {
    match summary.failure {
        Some(ref reason) => eprintln!("{}: {} ({reason})", summary.task, summary.status),
        None => eprintln!("{}: {}", summary.task, summary.status),
    }
    for child in summary.children.iter() {
        match child.failure {
            Some(ref reason) => eprintln!("  - {}: {} ({reason})", child.task, child.status),
            None => eprintln!("  - {}: {}", child.task, child.status),
        }
    }
    for skipped in summary.skipped.iter() {
        eprintln!("  - {skipped}: not run");
    }
}

fn print_listing(registry: &TaskRegistry) {
    println!("tasks ({}):", registry.len());
    for task in registry.tasks() {
        match &task.kind {
            TaskKind::Simple(simple) => {
                println!("  - {}", task.name);
                println!("      cmd: {}", simple.command);
                if let Some(ref cwd) = simple.cwd {
                    println!("      cwd: {cwd}");
                }
                if !simple.env.is_empty() {
                    println!("      env: {:?}", simple.env);
                }
            }
            TaskKind::Composite(composite) => {
                println!("  - {} ({:?})", task.name, composite.mode);
                println!("      subtasks: {:?}", composite.subtasks);
                if !composite.stop_on_error {
                    println!("      stop_on_error: false");
                }
                if let Some(limit) = composite.parallel_limit {
                    println!("      parallel_limit: {limit}");
                }
            }
        }
        let inputs = find_referenced_inputs(task, registry);
        if !inputs.is_empty() {
            println!("      inputs: {inputs:?}");
        }
    }

    let inputs: Vec<_> = registry.inputs().collect();
    if !inputs.is_empty() {
        println!();
        println!("inputs ({}):", inputs.len());
        for input in inputs {
            println!("  - {} [{:?}] {}", input.name, input.kind, input.prompt);
            if !input.options.is_empty() {
                println!("      options: {:?}", input.options);
            }
            if let Some(ref default) = input.default {
                println!("      default: {default}");
            }
        }
    }
}

/// Dry-run output: the resolved plan as an indented tree.
fn print_plan(registry: &TaskRegistry, task: &Task, values: &InputValues, root: &str, depth: usize) {
    let pad = "  ".repeat(depth);
    match &task.kind {
        TaskKind::Simple(simple) => {
            println!("{pad}{}: {}", task.name, substitute(&simple.command, values, root));
            if let Some(ref cwd) = simple.cwd {
                println!("{pad}  cwd: {}", substitute(cwd, values, root));
            }
            for (k, v) in substitute_env(&simple.env, values, root) {
                println!("{pad}  env: {k}={v}");
            }
        }
        TaskKind::Composite(composite) => {
            println!("{pad}{} ({:?}):", task.name, composite.mode);
            for sub in composite.subtasks.iter() {
                match registry.get(sub) {
                    Some(child) => print_plan(registry, child, values, root, depth + 1),
                    None => println!("{pad}  {sub}: <subtask not found>"),
                }
            }
        }
    }
}
