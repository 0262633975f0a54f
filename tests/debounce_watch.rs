use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use devloop::pipeline::{Trigger, TriggerReason};
use devloop::watch::backend::{ChangeEvent, ChangeKind};
use devloop::watch::engine::debounce_loop;
use devloop::watch::filter::WatchFilter;
use devloop::settings::model::WatchSpec;

type TestResult = Result<(), Box<dyn Error>>;

fn go_spec() -> WatchSpec {
    WatchSpec {
        paths: vec![PathBuf::from(".")],
        extensions: vec![".go".to_string()],
        ..Default::default()
    }
}

fn change(path: PathBuf) -> ChangeEvent {
    ChangeEvent {
        path,
        kind: ChangeKind::Modified,
    }
}

fn drain(rx: &mut mpsc::Receiver<Trigger>) -> Vec<Trigger> {
    let mut triggers = Vec::new();
    while let Ok(trigger) = rx.try_recv() {
        triggers.push(trigger);
    }
    triggers
}

#[tokio::test]
async fn a_burst_collapses_into_one_trigger() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    let filter = WatchFilter::from_spec(dir.path(), &go_spec())?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<Trigger>(8);
    tokio::spawn(debounce_loop(
        event_rx,
        filter,
        Duration::from_millis(80),
        trigger_tx,
    ));

    // Editor save pattern: several events for the same logical change.
    for _ in 0..10 {
        event_tx.send(change(root.join("main.go")))?;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(drain(&mut trigger_rx).len(), 1);

    // A second burst after the window yields exactly one more.
    for _ in 0..5 {
        event_tx.send(change(root.join("other.go")))?;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    let triggers = drain(&mut trigger_rx);
    assert_eq!(triggers.len(), 1);
    assert_eq!(
        triggers[0].reason,
        TriggerReason::FileChange(root.join("other.go"))
    );

    Ok(())
}

#[tokio::test]
async fn non_matching_events_produce_no_trigger() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    let filter = WatchFilter::from_spec(dir.path(), &go_spec())?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<Trigger>(8);
    tokio::spawn(debounce_loop(
        event_rx,
        filter,
        Duration::from_millis(50),
        trigger_tx,
    ));

    event_tx.send(change(root.join("notes.txt")))?;
    event_tx.send(change(root.join("README")))?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(drain(&mut trigger_rx).is_empty());
    Ok(())
}

#[tokio::test]
async fn pending_trigger_queue_has_depth_one() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    let filter = WatchFilter::from_spec(dir.path(), &go_spec())?;

    // Capacity-1 channel, nothing consuming: the first burst parks one
    // trigger, further bursts are coalesced into it.
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<Trigger>(1);
    tokio::spawn(debounce_loop(
        event_rx,
        filter,
        Duration::from_millis(40),
        trigger_tx,
    ));

    for round in 0..3 {
        event_tx.send(change(root.join(format!("f{round}.go"))))?;
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    assert_eq!(drain(&mut trigger_rx).len(), 1);
    Ok(())
}

#[test]
fn filter_applies_extensions_and_ignored_prefixes() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("vendor"))?;
    let root = dir.path().canonicalize()?;

    let spec = WatchSpec {
        paths: vec![PathBuf::from(".")],
        extensions: vec![".go".to_string(), "rs".to_string()],
        ignored_paths: vec![PathBuf::from("vendor")],
        ..Default::default()
    };
    let filter = WatchFilter::from_spec(dir.path(), &spec)?;

    assert!(filter.matches(&root.join("main.go")));
    assert!(filter.matches(&root.join("lib.rs")));
    assert!(filter.matches(&root.join("sub/deep/mod.GO")));
    assert!(!filter.matches(&root.join("main.py")));
    assert!(!filter.matches(&root.join("Makefile")));
    assert!(!filter.matches(&root.join("vendor/dep.go")));
    assert!(!filter.matches(&PathBuf::from("/elsewhere/main.go")));

    Ok(())
}

#[test]
fn missing_watch_path_is_a_configuration_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let spec = WatchSpec {
        paths: vec![PathBuf::from("does-not-exist")],
        ..Default::default()
    };

    let err = WatchFilter::from_spec(dir.path(), &spec).unwrap_err();
    assert!(err.to_string().contains("not accessible"));
    Ok(())
}

#[test]
fn empty_extension_list_matches_everything_under_root() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path().canonicalize()?;
    let filter = WatchFilter::from_spec(dir.path(), &WatchSpec::default())?;

    assert!(filter.matches(&root.join("anything.xyz")));
    assert!(filter.matches(&root.join("Makefile")));
    Ok(())
}
