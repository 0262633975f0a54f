#![cfg(unix)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use common::{sh_stage, wait_until};
use devloop::logbuf::StreamKind;
use devloop::pipeline::coordinator;
use devloop::pipeline::stage::{Stage, plan};
use devloop::pipeline::Trigger;
use devloop::settings::model::{PipelineSpec, Project, StageToggle};
use devloop::state::{ProjectShared, ProjectStatus};
use devloop::sync::hub::SyncNotifier;

type TestResult = Result<(), Box<dyn Error>>;

fn project_in(dir: &std::path::Path, pipeline: PipelineSpec) -> Project {
    Project {
        name: "demo".to_string(),
        path: dir.to_path_buf(),
        watch: Vec::new(),
        pipeline,
    }
}

struct Harness {
    shared: Arc<ProjectShared>,
    trigger_tx: mpsc::Sender<Trigger>,
    _cancel_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

fn start(project: Project) -> Harness {
    let shared = ProjectShared::shared();
    let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(1);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let task = tokio::spawn(coordinator::run(
        project,
        Arc::clone(&shared),
        trigger_rx,
        cancel_rx,
        SyncNotifier::new(),
    ));
    Harness {
        shared,
        trigger_tx,
        _cancel_tx: cancel_tx,
        task,
    }
}

#[test]
fn plan_keeps_the_fixed_stage_order() {
    let spec = PipelineSpec {
        build: StageToggle {
            status: true,
            ..Default::default()
        },
        format: StageToggle {
            status: true,
            ..Default::default()
        },
        test: StageToggle {
            status: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let stages: Vec<Stage> = plan(&spec).into_iter().map(|p| p.stage).collect();
    assert_eq!(stages, vec![Stage::Format, Stage::Test, Stage::Build]);

    // Default invocations are `go <subcommand>`.
    let plans = plan(&spec);
    assert_eq!(plans[0].program, "go");
    assert_eq!(plans[0].args, vec!["fmt"]);
}

#[tokio::test]
async fn stages_run_in_order_and_finish_with_success() -> TestResult {
    let dir = tempfile::tempdir()?;
    let pipeline = PipelineSpec {
        format: sh_stage("echo FMT"),
        build: sh_stage("echo BUILT"),
        ..Default::default()
    };
    let harness = start(project_in(dir.path(), pipeline));
    harness.trigger_tx.send(Trigger::startup()).await?;

    assert!(
        wait_until(Duration::from_secs(5), || harness.shared.status()
            == ProjectStatus::Success)
        .await
    );

    let buffer = harness.shared.buffer_snapshot();
    let stdout: Vec<&str> = buffer.std_out.iter().map(|e| e.text.as_str()).collect();
    let fmt_at = stdout.iter().position(|t| *t == "FMT").expect("FMT logged");
    let built_at = stdout.iter().position(|t| *t == "BUILT").expect("BUILT logged");
    assert!(fmt_at < built_at);

    // One completion record per stage on the log stream.
    let completions: Vec<&str> = buffer
        .std_log
        .iter()
        .filter(|e| e.text.contains("completed in"))
        .map(|e| e.text.as_str())
        .collect();
    assert_eq!(completions.len(), 2);
    assert!(completions[0].starts_with("format "));
    assert!(completions[1].starts_with("build "));

    drop(harness.trigger_tx);
    harness.task.await?;
    Ok(())
}

#[tokio::test]
async fn a_failing_stage_skips_the_rest() -> TestResult {
    let dir = tempfile::tempdir()?;
    let pipeline = PipelineSpec {
        format: sh_stage("echo boom >&2; exit 3"),
        build: sh_stage("echo BUILT"),
        ..Default::default()
    };
    let harness = start(project_in(dir.path(), pipeline));
    harness.trigger_tx.send(Trigger::startup()).await?;

    assert!(
        wait_until(Duration::from_secs(5), || harness.shared.status()
            == ProjectStatus::Failed(Stage::Format))
        .await
    );

    let buffer = harness.shared.buffer_snapshot();

    // The failure and its captured stderr are recorded.
    assert!(buffer.std_err.iter().any(|e| e.text == "boom"));
    assert!(
        buffer
            .std_log
            .iter()
            .any(|e| e.text.contains("format failed with exit code 3"))
    );

    // Build was skipped, not run and not failed.
    assert!(
        buffer
            .std_log
            .iter()
            .any(|e| e.stage == Some(Stage::Build) && e.text.contains("skipped"))
    );
    assert!(!buffer.std_out.iter().any(|e| e.text == "BUILT"));

    drop(harness.trigger_tx);
    harness.task.await?;
    Ok(())
}

#[tokio::test]
async fn a_missing_stage_binary_fails_that_trigger_only() -> TestResult {
    let dir = tempfile::tempdir()?;
    let pipeline = PipelineSpec {
        vet: StageToggle {
            status: true,
            command: Some("devloop-test-no-such-binary".to_string()),
            args: Vec::new(),
        },
        ..Default::default()
    };
    let harness = start(project_in(dir.path(), pipeline));
    harness.trigger_tx.send(Trigger::startup()).await?;

    assert!(
        wait_until(Duration::from_secs(5), || harness.shared.status()
            == ProjectStatus::Failed(Stage::Vet))
        .await
    );

    let buffer = harness.shared.buffer_snapshot();
    assert!(
        buffer
            .std_err
            .iter()
            .any(|e| e.stream == StreamKind::Stderr && e.stage == Some(Stage::Vet))
    );

    drop(harness.trigger_tx);
    harness.task.await?;
    Ok(())
}

#[tokio::test]
async fn before_scripts_run_ahead_of_stages() -> TestResult {
    use devloop::settings::model::{Script, ScriptKind, WatchSpec};

    let dir = tempfile::tempdir()?;
    let mut project = project_in(
        dir.path(),
        PipelineSpec {
            build: sh_stage("echo STAGE"),
            ..Default::default()
        },
    );
    project.watch.push(WatchSpec {
        scripts: vec![Script {
            kind: ScriptKind::Before,
            command: "echo HOOK".to_string(),
            path: None,
            output: true,
        }],
        ..Default::default()
    });

    let harness = start(project);
    harness.trigger_tx.send(Trigger::startup()).await?;

    assert!(
        wait_until(Duration::from_secs(5), || harness.shared.status()
            == ProjectStatus::Success)
        .await
    );

    let buffer = harness.shared.buffer_snapshot();
    let stdout: Vec<&str> = buffer.std_out.iter().map(|e| e.text.as_str()).collect();
    let hook_at = stdout.iter().position(|t| *t == "HOOK").expect("HOOK logged");
    let stage_at = stdout.iter().position(|t| *t == "STAGE").expect("STAGE logged");
    assert!(hook_at < stage_at);

    drop(harness.trigger_tx);
    harness.task.await?;
    Ok(())
}
