//! Supervised child processes: prompt on stdin, captured output, a deadline
//! and a cancellation token racing the exit.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Time a child gets to exit after SIGTERM before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

enum Outcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Run `cmd` to completion, feeding `input` on stdin.
///
/// Expiry of `timeout` or cancellation terminates the child and is a
/// `Generation` error. A non-zero exit is returned as output for the caller
/// to judge.
pub async fn run_supervised(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProcessOutput> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| AppError::Generation(format!("Failed to start {program}: {e}")))?;
    tracing::debug!(program = %program, pid = ?child.id(), "Child process started");

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Internal("stdin was not piped".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Internal("stdout was not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Internal("stderr was not piped".to_string()))?;

    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        // Dropping stdin afterwards closes it, which is the end-of-prompt signal
        if let Err(e) = stdin.write_all(&input).await {
            tracing::debug!(error = %e, "Child closed stdin early");
        }
    });
    let mut stdout_reader = tokio::spawn(read_lossy(stdout));
    let mut stderr_reader = tokio::spawn(read_lossy(stderr));

    let deadline = Instant::now() + timeout;
    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status?),
        _ = tokio::time::sleep_until(deadline) => Outcome::TimedOut,
        _ = cancel.cancelled() => Outcome::Cancelled,
    };

    match outcome {
        Outcome::Exited(status) => {
            writer.abort();
            // A grandchild that inherited the pipes keeps them open past the exit
            let drained = tokio::select! {
                output = async {
                    let stdout = join_output(&mut stdout_reader, "stdout").await?;
                    let stderr = join_output(&mut stderr_reader, "stderr").await?;
                    Ok::<_, AppError>((stdout, stderr))
                } => Some(output),
                _ = tokio::time::sleep_until(deadline) => None,
                _ = cancel.cancelled() => None,
            };
            let Some(output) = drained else {
                tracing::warn!(
                    program = %program,
                    "Child exited but its output pipes stayed open, abandoning them"
                );
                abort_io(&writer, &stdout_reader, &stderr_reader);
                return Err(if cancel.is_cancelled() {
                    AppError::Generation(format!("{program} was cancelled"))
                } else {
                    AppError::Generation(format!(
                        "{program} timed out after {}s",
                        timeout.as_secs()
                    ))
                });
            };
            let (stdout, stderr) = output?;
            tracing::debug!(program = %program, exit_code = ?status.code(), "Child process exited");
            Ok(ProcessOutput {
                status,
                stdout,
                stderr,
            })
        }
        Outcome::TimedOut => {
            tracing::warn!(
                program = %program,
                timeout_secs = timeout.as_secs(),
                "Child process timed out, terminating"
            );
            terminate(&mut child).await;
            abort_io(&writer, &stdout_reader, &stderr_reader);
            Err(AppError::Generation(format!(
                "{program} timed out after {}s",
                timeout.as_secs()
            )))
        }
        Outcome::Cancelled => {
            tracing::warn!(program = %program, "Shutdown requested, terminating child process");
            terminate(&mut child).await;
            abort_io(&writer, &stdout_reader, &stderr_reader);
            Err(AppError::Generation(format!("{program} was cancelled")))
        }
    }
}

/// A grandchild may still hold the pipes open, so the I/O tasks are not awaited.
fn abort_io(
    writer: &JoinHandle<()>,
    stdout_reader: &JoinHandle<Result<String>>,
    stderr_reader: &JoinHandle<Result<String>>,
) {
    writer.abort();
    stdout_reader.abort();
    stderr_reader.abort();
}

async fn join_output(handle: &mut JoinHandle<Result<String>>, stream: &str) -> Result<String> {
    handle
        .await
        .map_err(|e| AppError::Internal(format!("{stream} reader panicked: {e}")))?
}

async fn read_lossy<R: AsyncRead + Unpin>(mut reader: R) -> Result<String> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// SIGTERM, then SIGKILL if the child is still running after the grace period.
async fn terminate(child: &mut Child) {
    if send_sigterm(child) {
        match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(exit_code = ?status.code(), "Child exited after SIGTERM");
                return;
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "Waiting for child failed"),
            Err(_) => tracing::warn!("Child ignored SIGTERM, killing"),
        }
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill child process");
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    match child.id() {
        // SAFETY: kill(2) with a pid we spawned and still own; no memory is touched.
        Some(pid) => unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 },
        None => false,
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}
