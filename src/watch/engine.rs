// src/watch/engine.rs

//! Per-project watch engine: backend → filter → debounce → trigger.
//!
//! Each watch spec of a project gets its own backend instance and debounce
//! task; all of them feed the project's single capacity-1 trigger channel,
//! so bursts across specs still coalesce into one pipeline run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::DevloopError;
use crate::pipeline::Trigger;
use crate::settings::model::{Project, WatchConfig};
use crate::watch::backend::{ChangeEvent, WatchBackend, backend_for};
use crate::watch::filter::WatchFilter;

/// Keeps the engine's backends and tasks alive. Dropping (or stopping) the
/// handle stops watching; the trigger channel closes once the last debounce
/// task ends.
pub struct WatchEngineHandle {
    backends: Vec<Box<dyn WatchBackend>>,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchEngineHandle {
    pub fn stop(mut self) {
        self.backends.clear();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for WatchEngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchEngineHandle")
            .field("backends", &self.backends.len())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

/// Start watching a project's specs.
///
/// Fails with a configuration error when a configured path does not exist;
/// the caller disables watching for this project only.
pub fn spawn(
    project: &Project,
    config: &WatchConfig,
    trigger_tx: mpsc::Sender<Trigger>,
) -> Result<WatchEngineHandle, DevloopError> {
    let window = Duration::from_millis(config.debounce_ms);
    let mut backends = Vec::new();
    let mut tasks = Vec::new();

    for spec in &project.watch {
        let filter = WatchFilter::from_spec(&project.path, spec)?;

        if spec.preview {
            let files = filter.walk_matching();
            info!(
                project = %project.name,
                files = files.len(),
                "watch preview"
            );
            for file in &files {
                info!(project = %project.name, "watching {:?}", file);
            }
        }

        let mut backend = backend_for(config);
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChangeEvent>();
        backend.start(filter.roots(), event_tx).map_err(|err| {
            DevloopError::Config(format!("starting {} watch backend: {err}", backend.name()))
        })?;

        debug!(
            project = %project.name,
            backend = backend.name(),
            roots = filter.roots().len(),
            "watch engine started"
        );

        let task = tokio::spawn(debounce_loop(
            event_rx,
            filter,
            window,
            trigger_tx.clone(),
        ));

        backends.push(backend);
        tasks.push(task);
    }

    Ok(WatchEngineHandle { backends, tasks })
}

/// Collapse bursts of change events into single triggers.
///
/// The first matching event opens a coalescing window; every further event
/// inside the window (editor temp-file + rename patterns produce several)
/// extends nothing and emits nothing. When the window closes one trigger is
/// sent with `try_send`: a full channel means a run is already pending, and
/// the extra trigger is deliberately dropped (depth-1 queue).
pub async fn debounce_loop(
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    filter: WatchFilter,
    window: Duration,
    trigger_tx: mpsc::Sender<Trigger>,
) {
    while let Some(event) = events.recv().await {
        if !filter.matches(&event.path) {
            continue;
        }
        let mut last_path = event.path;

        // Absorb the rest of the burst.
        loop {
            match tokio::time::timeout(window, events.recv()).await {
                Ok(Some(event)) => {
                    if filter.matches(&event.path) {
                        last_path = event.path;
                    }
                }
                Ok(None) => {
                    send_trigger(&trigger_tx, Trigger::file_change(last_path));
                    return;
                }
                Err(_elapsed) => break,
            }
        }

        send_trigger(&trigger_tx, Trigger::file_change(last_path));
    }

    debug!("watch event stream ended");
}

fn send_trigger(trigger_tx: &mpsc::Sender<Trigger>, trigger: Trigger) {
    match trigger_tx.try_send(trigger) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            debug!("trigger already pending; coalesced");
        }
        Err(TrySendError::Closed(_)) => {
            debug!("trigger consumer gone");
        }
    }
}
