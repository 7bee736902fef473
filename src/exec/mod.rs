// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the commands of simple
//! tasks, using `tokio::process::Command`, and reporting output and exit
//! status back to the engine.
//!
//! - [`backend`] provides the `ProcessBackend` trait the engine is generic
//!   over, plus the spec/handle/exit types crossing that seam.
//! - [`task_runner`] holds `RealProcessBackend`, the production backend.
//! - [`output`] carries live output lines to subscribers.

pub mod backend;
pub mod output;
pub mod task_runner;

pub use backend::{ProcessBackend, ProcessExit, ProcessHandle, ProcessSpec};
pub use output::{OutputHub, OutputLine, OutputSink, OutputStream};
pub use task_runner::RealProcessBackend;
