// src/pipeline/service.rs

//! Supervision of the long-lived run-stage process.
//!
//! The run stage is the only one whose process outlives the pipeline
//! invocation. Its supervisor streams output into the log buffer until the
//! process exits on its own (recorded as a crash, no automatic restart) or
//! the next rebuild replaces it.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::logbuf::LogEntry;
use crate::pipeline::runner::{GRACE_PERIOD, attach_output, terminate_gracefully};
use crate::pipeline::stage::Stage;
use crate::state::{ProjectShared, ProjectStatus};
use crate::sync::hub::SyncNotifier;

/// Handle to a supervised run process. Dropping it kills the process
/// (kill_on_drop); [`ServiceHandle::stop`] is the graceful path.
#[derive(Debug)]
pub struct ServiceHandle {
    stop_tx: oneshot::Sender<()>,
    done_rx: oneshot::Receiver<()>,
}

impl ServiceHandle {
    /// Terminate the service and wait for the supervisor to confirm. The
    /// wait is bounded by the grace period plus a margin, so a wedged
    /// process cannot stall the next pipeline run indefinitely.
    pub async fn stop(self) {
        if self.stop_tx.send(()).is_err() {
            // Supervisor already exited (crash recorded); nothing to stop.
            return;
        }
        let _ = tokio::time::timeout(GRACE_PERIOD + Duration::from_secs(2), self.done_rx).await;
    }
}

/// Start the run command under supervision.
///
/// Output streams into the log buffer continuously. An exit that was not
/// requested through the handle is recorded as a run-process crash; the
/// project is left in `Failed(Run)` until the next file change re-triggers
/// the pipeline.
pub fn spawn_service(
    project: &str,
    program: &str,
    args: &[String],
    workdir: &Path,
    shared: Arc<ProjectShared>,
    notifier: SyncNotifier,
) -> Result<ServiceHandle> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning run process '{program}' in {workdir:?}"))?;

    info!(project, program, "run process started");
    shared.append(LogEntry::status(
        Some(Stage::Run),
        format!("started '{program}'"),
    ));
    shared.set_status(ProjectStatus::RunningService);
    notifier.notify();

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    attach_output(
        stdout,
        stderr,
        Some(Stage::Run),
        Arc::clone(&shared),
        notifier.clone(),
    );

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let (done_tx, done_rx) = oneshot::channel::<()>();
    let project = project.to_string();

    tokio::spawn(async move {
        tokio::select! {
            status = child.wait() => {
                let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                warn!(project = %project, exit_code = code, "run process exited unexpectedly");
                shared.append(LogEntry::status(
                    Some(Stage::Run),
                    format!("run process exited unexpectedly (exit code {code})"),
                ));
                shared.set_status(ProjectStatus::Failed(Stage::Run));
                notifier.notify();
            }
            _ = &mut stop_rx => {
                info!(project = %project, "stopping run process");
                terminate_gracefully(&mut child).await;
                shared.append(LogEntry::status(Some(Stage::Run), "run process stopped"));
                notifier.notify();
            }
        }
        let _ = done_tx.send(());
    });

    Ok(ServiceHandle { stop_tx, done_rx })
}
