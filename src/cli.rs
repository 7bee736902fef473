// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `taskweave`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskweave",
    version,
    about = "Run simple and composite tasks defined in a TOML task file.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task file (TOML).
    ///
    /// Default: `Taskweave.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = "Taskweave.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKWEAVE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List tasks and inputs.
    List,

    /// Print the inputs a task needs, in prompt order.
    Inputs {
        /// Task name.
        task: String,
    },

    /// Run a task.
    Run {
        /// Task name.
        task: String,

        /// Input value as `name=value`; repeatable.
        #[arg(long = "input", short = 'i', value_name = "NAME=VALUE", value_parser = parse_key_val)]
        inputs: Vec<(String, String)>,

        /// Override `[config].parallel_limit`.
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
        parallel_limit: Option<u16>,

        /// Resolve and print the plan, but don't start any process.
        #[arg(long)]
        dry_run: bool,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("invalid input `{s}` (expected NAME=VALUE)")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_inputs() {
        let args = CliArgs::try_parse_from([
            "taskweave",
            "run",
            "deploy",
            "--input",
            "env=prod",
            "-i",
            "tag=a=b",
            "--config",
            "ci.toml",
        ])
        .expect("valid args");

        assert_eq!(args.config, "ci.toml");
        match args.command {
            Command::Run { task, inputs, dry_run, .. } => {
                assert_eq!(task, "deploy");
                assert_eq!(
                    inputs,
                    vec![
                        ("env".to_string(), "prod".to_string()),
                        ("tag".to_string(), "a=b".to_string())
                    ]
                );
                assert!(!dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_input_without_equals() {
        assert!(CliArgs::try_parse_from(["taskweave", "run", "t", "--input", "oops"]).is_err());
    }
}
