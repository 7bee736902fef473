// src/exec/task_runner.rs

//! Real process backend built on `tokio::process`.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskweaveError};
use crate::exec::backend::{ProcessBackend, ProcessExit, ProcessHandle, ProcessSpec};
use crate::exec::output::{OutputSink, OutputStream};

/// How long a cancelled process group gets between SIGTERM and SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// How long to wait for output readers to drain after the child exits.
/// Background grandchildren can keep the pipes open indefinitely.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs each command through the platform shell (`sh -c` / `cmd /C`).
///
/// stdout and stderr are piped and read line by line; on Unix the child leads
/// its own process group so cancellation reaches everything it started.
#[derive(Debug, Clone, Default)]
pub struct RealProcessBackend;

impl RealProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessBackend for RealProcessBackend {
    fn spawn(&self, spec: ProcessSpec, output: OutputSink) -> Result<ProcessHandle> {
        info!(
            task = %spec.task,
            record = spec.record,
            cmd = %spec.command,
            cwd = %spec.cwd.display(),
            "starting task process"
        );

        let mut cmd = shell_command(&spec.command);
        cmd.current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| TaskweaveError::Spawn {
            task: spec.task.clone(),
            source,
        })?;

        let readers = [
            child
                .stdout
                .take()
                .map(|out| pump_lines(out, OutputStream::Stdout, output.clone())),
            child
                .stderr
                .take()
                .map(|err| pump_lines(err, OutputStream::Stderr, output.clone())),
        ];

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel::<ProcessExit>();

        tokio::spawn(async move {
            let exit = supervise(&spec, child, cancel_rx).await;

            for reader in readers.into_iter().flatten() {
                if tokio::time::timeout(DRAIN_TIMEOUT, reader).await.is_err() {
                    debug!(task = %spec.task, record = spec.record, "output reader still open after exit; detaching");
                }
            }

            if exit_tx.send(exit).is_err() {
                debug!(task = %spec.task, record = spec.record, "exit receiver dropped before completion");
            }
        });

        Ok(ProcessHandle::new(cancel_tx, exit_rx))
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

/// Forward every line of `stream` to the sink until EOF.
///
/// Lines are split on raw `\n` and decoded lossily, so bytes that are not
/// UTF-8 never stop the reader before EOF.
fn pump_lines<R>(reader: R, stream: OutputStream, sink: OutputSink) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => sink.emit(stream, decode_line(&buf)),
                Err(e) => {
                    debug!(task = %sink.task(), ?stream, error = %e, "stopped reading process output");
                    break;
                }
            }
        }
    })
}

/// One raw line without its `\n` / `\r\n` terminator, invalid UTF-8 replaced.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Wait for the child to exit, or terminate it when cancellation arrives.
async fn supervise(
    spec: &ProcessSpec,
    mut child: Child,
    mut cancel_rx: oneshot::Receiver<()>,
) -> ProcessExit {
    tokio::select! {
        status = child.wait() => {
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(task = %spec.task, record = spec.record, error = %e, "failed waiting for process");
                    None
                }
            };
            info!(
                task = %spec.task,
                record = spec.record,
                exit_code = code.unwrap_or(-1),
                "task process exited"
            );
            ProcessExit { code, cancelled: false }
        }

        cancel = &mut cancel_rx => {
            if cancel.is_err() {
                // Handle dropped: nobody is waiting, but the process still
                // has to go (kill_on_drop covers the direct child only).
                debug!(task = %spec.task, record = spec.record, "process handle dropped; terminating");
            } else {
                info!(task = %spec.task, record = spec.record, "cancellation requested; terminating process group");
            }
            let code = terminate(spec, &mut child).await;
            ProcessExit { code, cancelled: true }
        }
    }
}

/// SIGTERM the process group, escalate to SIGKILL after the grace period.
async fn terminate(spec: &ProcessSpec, child: &mut Child) -> Option<i32> {
    if let Some(code) = terminate_group(spec, child).await {
        return code;
    }

    if let Err(e) = child.kill().await {
        warn!(
            task = %spec.task,
            record = spec.record,
            error = %e,
            "failed to kill child process on cancellation"
        );
    }
    child.wait().await.ok().and_then(|s| s.code())
}

/// Returns `Some(code)` when the group leader exited within the grace period.
#[cfg(unix)]
async fn terminate_group(spec: &ProcessSpec, child: &mut Child) -> Option<Option<i32>> {
    let pid = child.id()?;
    signal_group(pid, libc::SIGTERM);

    match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            // The leader is gone; make sure stragglers in its group are too.
            signal_group(pid, libc::SIGKILL);
            Some(status.code())
        }
        Ok(Err(e)) => {
            warn!(task = %spec.task, record = spec.record, error = %e, "failed waiting for terminated process");
            signal_group(pid, libc::SIGKILL);
            None
        }
        Err(_) => {
            debug!(task = %spec.task, record = spec.record, "process ignored SIGTERM; killing");
            signal_group(pid, libc::SIGKILL);
            None
        }
    }
}

#[cfg(not(unix))]
async fn terminate_group(_spec: &ProcessSpec, _child: &mut Child) -> Option<Option<i32>> {
    None
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    // The child was spawned with process_group(0), so its pid is the pgid.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, signal) };
    if rc != 0 {
        debug!(pid, signal, "killpg failed (group already gone?)");
    }
}
