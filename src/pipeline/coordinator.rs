// src/pipeline/coordinator.rs

//! Per-project pipeline coordination.
//!
//! One coordinator task per project consumes debounced triggers and drives
//! the stage state machine: `Idle → Running(stage) → {Success, Failed,
//! RunningService}`. The trigger channel has capacity 1 and producers use
//! `try_send`, so a trigger arriving mid-execution leaves exactly one
//! pending follow-up run and anything beyond that is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::logbuf::{LogEntry, StreamKind};
use crate::pipeline::runner::{StageReport, run_streamed};
use crate::pipeline::service::{ServiceHandle, spawn_service};
use crate::pipeline::stage::{Stage, StagePlan, plan};
use crate::settings::model::{Project, ScriptKind};
use crate::state::{ProjectShared, ProjectStatus};
use crate::sync::hub::SyncNotifier;

/// Why a pipeline run fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReason {
    Startup,
    FileChange(PathBuf),
}

/// A debounced, coalesced signal that a project's watched files changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub reason: TriggerReason,
}

impl Trigger {
    pub fn startup() -> Self {
        Self {
            reason: TriggerReason::Startup,
        }
    }

    pub fn file_change(path: PathBuf) -> Self {
        Self {
            reason: TriggerReason::FileChange(path),
        }
    }

    fn path(&self) -> String {
        match &self.reason {
            TriggerReason::Startup => String::new(),
            TriggerReason::FileChange(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Coordinator task entry point. Runs until the trigger channel closes or
/// the cancel flag flips, then terminates any supervised run process.
///
/// `project` is a private read-only copy: configuration edits never mutate
/// an in-flight coordinator, they restart it.
pub async fn run(
    project: Project,
    shared: Arc<ProjectShared>,
    mut trigger_rx: mpsc::Receiver<Trigger>,
    cancel_rx: watch::Receiver<bool>,
    notifier: SyncNotifier,
) {
    let mut service: Option<ServiceHandle> = None;

    while let Some(trigger) = trigger_rx.recv().await {
        if *cancel_rx.borrow() {
            break;
        }
        debug!(project = %project.name, ?trigger, "pipeline trigger");
        execute(
            &project,
            &shared,
            &mut service,
            trigger,
            cancel_rx.clone(),
            &notifier,
        )
        .await;
    }

    if let Some(handle) = service.take() {
        handle.stop().await;
    }
    debug!(project = %project.name, "coordinator stopped");
}

/// One full pipeline execution for one trigger.
async fn execute(
    project: &Project,
    shared: &Arc<ProjectShared>,
    service: &mut Option<ServiceHandle>,
    trigger: Trigger,
    mut cancel_rx: watch::Receiver<bool>,
    notifier: &SyncNotifier,
) {
    // At most one live service process per project: the previous run stage
    // dies before anything else happens.
    if let Some(handle) = service.take() {
        handle.stop().await;
    }

    let workdir = project.path.clone();
    shared.append(
        LogEntry::status(None, "pipeline triggered").with_path(trigger.path()),
    );

    run_scripts(project, &workdir, shared, ScriptKind::Before, notifier, &mut cancel_rx).await;

    let stages = plan(&project.pipeline);
    let mut failed = false;

    for (index, stage_plan) in stages.iter().enumerate() {
        shared.set_status(ProjectStatus::Running(stage_plan.stage));
        notifier.notify();

        match run_stage(project, &workdir, shared, stage_plan, notifier, &mut cancel_rx).await {
            StageResult::Success => {}
            StageResult::Cancelled => return,
            StageResult::Failed => {
                // Stop-on-failure: later stages are skipped, not retried.
                for skipped in &stages[index + 1..] {
                    shared.append(LogEntry::status(
                        Some(skipped.stage),
                        format!("{} skipped (earlier stage failed)", skipped.stage),
                    ));
                }
                shared.set_status(ProjectStatus::Failed(stage_plan.stage));
                notifier.notify();
                failed = true;
                break;
            }
        }
    }

    if failed {
        return;
    }

    run_scripts(project, &workdir, shared, ScriptKind::After, notifier, &mut cancel_rx).await;

    if project.pipeline.run {
        let (program, args) = run_invocation(project, &workdir);
        match spawn_service(
            &project.name,
            &program,
            &args,
            &workdir,
            Arc::clone(shared),
            notifier.clone(),
        ) {
            Ok(handle) => *service = Some(handle),
            Err(err) => {
                warn!(project = %project.name, error = %err, "failed to start run process");
                shared.append(LogEntry::line(
                    StreamKind::Stderr,
                    Some(Stage::Run),
                    err.to_string(),
                ));
                shared.set_status(ProjectStatus::Failed(Stage::Run));
                notifier.notify();
            }
        }
    } else {
        shared.set_status(ProjectStatus::Success);
        notifier.notify();
    }
}

enum StageResult {
    Success,
    Failed,
    Cancelled,
}

async fn run_stage(
    project: &Project,
    workdir: &Path,
    shared: &Arc<ProjectShared>,
    stage_plan: &StagePlan,
    notifier: &SyncNotifier,
    cancel_rx: &mut watch::Receiver<bool>,
) -> StageResult {
    info!(
        project = %project.name,
        stage = %stage_plan.stage,
        program = %stage_plan.program,
        "stage started"
    );

    let report = run_streamed(
        &stage_plan.program,
        &stage_plan.args,
        workdir,
        Arc::clone(shared),
        Some(stage_plan.stage),
        true,
        notifier.clone(),
        cancel_rx,
    )
    .await;

    match report {
        Ok(report) if report.cancelled => StageResult::Cancelled,
        Ok(report) => {
            record_stage_outcome(shared, stage_plan.stage, &report);
            notifier.notify();
            if report.success() {
                StageResult::Success
            } else {
                StageResult::Failed
            }
        }
        Err(err) => {
            // Spawn failure (missing binary, bad workdir) counts as a stage
            // failure for this trigger.
            warn!(project = %project.name, stage = %stage_plan.stage, error = %err, "stage error");
            shared.append(LogEntry::line(
                StreamKind::Stderr,
                Some(stage_plan.stage),
                err.to_string(),
            ));
            shared.append(LogEntry::status(
                Some(stage_plan.stage),
                format!("{} failed to start", stage_plan.stage),
            ));
            notifier.notify();
            StageResult::Failed
        }
    }
}

fn record_stage_outcome(shared: &ProjectShared, stage: Stage, report: &StageReport) {
    let elapsed = report.duration.as_millis();
    if report.success() {
        shared.append(LogEntry::status(
            Some(stage),
            format!("{stage} completed in {elapsed}ms"),
        ));
    } else {
        let tail = report
            .stderr
            .last()
            .map(|line| format!(": {line}"))
            .unwrap_or_default();
        shared.append(LogEntry::status(
            Some(stage),
            format!(
                "{stage} failed with exit code {}{tail}",
                report.exit_code
            ),
        ));
    }
}

/// Run the `before` or `after` script hooks of every watch spec. Scripts are
/// hooks, not stages: a failing script is recorded but does not stop the
/// pipeline.
async fn run_scripts(
    project: &Project,
    workdir: &Path,
    shared: &Arc<ProjectShared>,
    kind: ScriptKind,
    notifier: &SyncNotifier,
    cancel_rx: &mut watch::Receiver<bool>,
) {
    let scripts = project
        .watch
        .iter()
        .flat_map(|spec| spec.scripts.iter())
        .filter(|script| script.kind == kind);

    for script in scripts {
        let dir = match &script.path {
            Some(path) => workdir.join(path),
            None => workdir.to_path_buf(),
        };

        let (program, args) = shell_invocation(&script.command);
        debug!(project = %project.name, command = %script.command, ?kind, "running script");

        let report = run_streamed(
            program,
            &args,
            &dir,
            Arc::clone(shared),
            None,
            script.output,
            notifier.clone(),
            cancel_rx,
        )
        .await;

        match report {
            Ok(report) if !report.success() && !report.cancelled => {
                shared.append(LogEntry::status(
                    None,
                    format!(
                        "script '{}' failed with exit code {}",
                        script.command, report.exit_code
                    ),
                ));
                notifier.notify();
            }
            Ok(_) => {}
            Err(err) => {
                shared.append(LogEntry::status(
                    None,
                    format!("script '{}' error: {err}", script.command),
                ));
                notifier.notify();
            }
        }
    }
}

/// Platform shell wrapper for script command lines.
fn shell_invocation(command: &str) -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        ("cmd", vec!["/C".to_string(), command.to_string()])
    } else {
        ("sh", vec!["-c".to_string(), command.to_string()])
    }
}

/// Resolve the run-stage invocation: the built binary in the project
/// directory when present, otherwise the project name from `PATH` (the
/// usual install target).
fn run_invocation(project: &Project, workdir: &Path) -> (String, Vec<String>) {
    let local = workdir.join(&project.name);
    if local.is_file() {
        // Absolute path: the child's workdir is the project directory, so a
        // relative program path would resolve against the wrong base.
        let program = local.canonicalize().unwrap_or(local);
        (program.to_string_lossy().into_owned(), Vec::new())
    } else {
        (project.name.clone(), Vec::new())
    }
}
