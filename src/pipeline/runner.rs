// src/pipeline/runner.rs

//! Single-command execution with incremental output capture.
//!
//! Each spawned process gets a dedicated reader task per stream so capture
//! never blocks the process or the coordinator; lines land in the project's
//! log buffer as they arrive, letting the dashboard show partial output of
//! long-running stages.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::logbuf::{LogEntry, StreamKind};
use crate::pipeline::stage::Stage;
use crate::state::ProjectShared;
use crate::sync::hub::SyncNotifier;

/// How long a terminated process gets to exit before it is force-killed.
pub const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Result of one command invocation.
#[derive(Debug)]
pub struct StageReport {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub duration: Duration,
    /// Set when the command was cancelled rather than exiting on its own.
    pub cancelled: bool,
}

impl StageReport {
    pub fn success(&self) -> bool {
        !self.cancelled && self.exit_code == 0
    }
}

/// Run one command to completion, streaming its output into the project's
/// log buffer.
///
/// - `stage` labels the captured entries; `None` for script hooks.
/// - `emit_output` controls whether lines are appended to the buffer at all
///   (scripts may run silently); captured lines are always returned.
/// - Flipping `cancel` to `true` terminates the command: graceful signal
///   first, forced kill after [`GRACE_PERIOD`].
pub async fn run_streamed(
    program: &str,
    args: &[String],
    workdir: &Path,
    shared: Arc<ProjectShared>,
    stage: Option<Stage>,
    emit_output: bool,
    notifier: SyncNotifier,
    cancel: &mut tokio::sync::watch::Receiver<bool>,
) -> Result<StageReport> {
    let started = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning '{program}' in {workdir:?}"))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let out_task = spawn_reader(
        stdout,
        StreamKind::Stdout,
        stage,
        emit_output,
        Arc::clone(&shared),
        notifier.clone(),
    );
    let err_task = spawn_reader(
        stderr,
        StreamKind::Stderr,
        stage,
        emit_output,
        Arc::clone(&shared),
        notifier.clone(),
    );

    let (status, cancelled) = tokio::select! {
        status = child.wait() => {
            let status = status.with_context(|| format!("waiting for '{program}'"))?;
            (Some(status), false)
        }
        changed = cancel.changed() => {
            // A closed cancel channel means the project is being torn down;
            // treat it the same as an explicit cancellation.
            if changed.is_err() || *cancel.borrow() {
                debug!(program, "cancellation requested; terminating command");
                (terminate_gracefully(&mut child).await, true)
            } else {
                let status = child.wait().await
                    .with_context(|| format!("waiting for '{program}'"))?;
                (Some(status), false)
            }
        }
    };

    let stdout = join_reader(out_task).await;
    let stderr = join_reader(err_task).await;

    let exit_code = status.and_then(|s| s.code()).unwrap_or(-1);

    Ok(StageReport {
        exit_code,
        stdout,
        stderr,
        duration: started.elapsed(),
        cancelled,
    })
}

/// Consume one output stream line by line. Lines go into the log buffer
/// (when `emit` is set) and are collected for the final report.
fn spawn_reader<R>(
    stream: Option<R>,
    kind: StreamKind,
    stage: Option<Stage>,
    emit: bool,
    shared: Arc<ProjectShared>,
    notifier: SyncNotifier,
) -> Option<JoinHandle<Vec<String>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let stream = stream?;
    Some(tokio::spawn(async move {
        let reader = BufReader::new(stream);
        let mut lines = reader.lines();
        let mut captured = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            debug!(stream = kind.label(), "{line}");
            if emit {
                shared.append(LogEntry::line(kind, stage, line.clone()));
                notifier.notify();
            }
            captured.push(line);
        }

        captured
    }))
}

/// Fire-and-forget output capture for the supervised run process: both
/// streams into the buffer, nothing collected.
pub(crate) fn attach_output(
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    stage: Option<Stage>,
    shared: Arc<ProjectShared>,
    notifier: SyncNotifier,
) {
    spawn_reader(
        stdout,
        StreamKind::Stdout,
        stage,
        true,
        Arc::clone(&shared),
        notifier.clone(),
    );
    spawn_reader(stderr, StreamKind::Stderr, stage, true, shared, notifier);
}

async fn join_reader(task: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Terminate a child process: graceful signal first, forced kill once the
/// grace period elapses. Returns the exit status when one was collected.
pub(crate) async fn terminate_gracefully(child: &mut Child) -> Option<std::process::ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain kill(2) on a pid we own; no memory is touched.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            match tokio::time::timeout(GRACE_PERIOD, child.wait()).await {
                Ok(Ok(status)) => return Some(status),
                Ok(Err(err)) => {
                    warn!(error = %err, "waiting for terminated child failed");
                    return None;
                }
                Err(_) => {
                    debug!("grace period elapsed; force-killing child");
                }
            }
        }
    }

    if let Err(err) = child.kill().await {
        warn!(error = %err, "failed to kill child process");
    }
    child.wait().await.ok()
}
