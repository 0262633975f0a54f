// src/orchestrator.rs

//! Project supervision and the configuration mutation gate.
//!
//! The orchestrator owns the configuration document: every replacement flows
//! through its control-event loop, never through ambient shared state. Each
//! project runs as an independent watch-engine + coordinator pair holding a
//! private copy of its spec, so an edit never mutates an in-flight pipeline
//! — it restarts the affected projects and leaves the rest running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::errors::DevloopError;
use crate::logbuf::LogEntry;
use crate::pipeline::{Trigger, coordinator};
use crate::settings::model::{ConfigDocument, Project, WatchConfig};
use crate::settings::store::SettingsStore;
use crate::settings::validate::validate_document;
use crate::state::{ProjectShared, ProjectStatus};
use crate::sync::hub::Hub;
use crate::watch::engine::{self, WatchEngineHandle};

/// Events consumed by the orchestrator's gate.
pub enum ControlEvent {
    /// A session submitted a replacement document.
    ReplaceDocument {
        document: ConfigDocument,
        reply: oneshot::Sender<Result<(), DevloopError>>,
    },
    Shutdown,
}

struct ProjectHandle {
    shared: Arc<ProjectShared>,
    engine: Option<WatchEngineHandle>,
    trigger_tx: mpsc::Sender<Trigger>,
    cancel_tx: watch::Sender<bool>,
    coordinator: tokio::task::JoinHandle<()>,
}

pub struct Orchestrator {
    hub: Arc<Hub>,
    store: Arc<dyn SettingsStore>,
    control_rx: mpsc::Receiver<ControlEvent>,
    handles: HashMap<String, ProjectHandle>,
}

impl Orchestrator {
    pub fn new(
        hub: Arc<Hub>,
        store: Arc<dyn SettingsStore>,
        control_rx: mpsc::Receiver<ControlEvent>,
    ) -> Self {
        Self {
            hub,
            store,
            control_rx,
            handles: HashMap::new(),
        }
    }

    /// Main loop: spawn the configured projects, then serialize every
    /// document replacement until shutdown.
    pub async fn run(mut self) -> Result<()> {
        let document = self.hub.document();
        info!(projects = document.projects.len(), "orchestrator started");

        for project in &document.projects {
            self.spawn_project(project, &document.watch, None);
        }
        self.hub.notifier().notify();

        while let Some(event) = self.control_rx.recv().await {
            match event {
                ControlEvent::ReplaceDocument { document, reply } => {
                    let outcome = self.apply_edit(document).await;
                    let _ = reply.send(outcome);
                }
                ControlEvent::Shutdown => {
                    info!("shutdown requested, stopping orchestrator");
                    break;
                }
            }
        }

        self.shutdown_all().await;
        info!("orchestrator exiting");
        Ok(())
    }

    /// Apply a replacement document: validate, persist, restart the projects
    /// whose specs changed, publish.
    ///
    /// A persistence failure does not discard the edit — the in-memory
    /// document is still applied and the error goes back to the editing
    /// session as a warning.
    async fn apply_edit(&mut self, document: ConfigDocument) -> Result<(), DevloopError> {
        validate_document(&document)?;

        let persist_err = self.store.save(&document).err();
        let old = self.hub.document();

        // Watch strategy changes affect every engine; project-level diffs
        // handle the rest.
        let watch_changed = old.watch != document.watch;

        let old_names: Vec<String> = old.projects.iter().map(|p| p.name.clone()).collect();
        for name in &old_names {
            if !document.projects.iter().any(|p| &p.name == name) {
                info!(project = %name, "project removed by edit");
                self.stop_project(name).await;
            }
        }

        for project in &document.projects {
            match old.projects.iter().find(|p| p.name == project.name) {
                None => {
                    info!(project = %project.name, "project added by edit");
                    self.spawn_project(project, &document.watch, None);
                }
                Some(previous) if previous != project || watch_changed => {
                    info!(project = %project.name, "project changed by edit; restarting");
                    let shared = self
                        .handles
                        .get(&project.name)
                        .map(|handle| Arc::clone(&handle.shared));
                    self.stop_project(&project.name).await;
                    // Keep the existing log buffer across the restart.
                    self.spawn_project(project, &document.watch, shared);
                }
                Some(_) => {}
            }
        }

        self.hub.replace_document(document);
        self.hub.notifier().notify();

        match persist_err {
            Some(err) => {
                warn!(error = %err, "settings save failed; edit applied in memory only");
                Err(DevloopError::Persistence(err.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Start the watch-engine + coordinator pair for one project.
    fn spawn_project(
        &mut self,
        project: &Project,
        watch_config: &WatchConfig,
        shared: Option<Arc<ProjectShared>>,
    ) {
        let shared = shared.unwrap_or_else(ProjectShared::shared);
        self.hub.register_project(&project.name, Arc::clone(&shared));

        let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(1);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let notifier = self.hub.notifier();

        let mut config_error = false;
        let engine = if project.watch.is_empty() {
            None
        } else {
            match engine::spawn(project, watch_config, trigger_tx.clone()) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    // One project's bad watch path never affects the others.
                    warn!(project = %project.name, error = %err, "watching disabled");
                    shared.append(LogEntry::status(None, err.to_string()));
                    shared.set_status(ProjectStatus::ConfigError);
                    notifier.notify();
                    config_error = true;
                    None
                }
            }
        };

        let coordinator = tokio::spawn(coordinator::run(
            project.clone(),
            Arc::clone(&shared),
            trigger_rx,
            cancel_rx,
            notifier,
        ));

        if !config_error {
            // Every project builds once at startup; later runs come from
            // file changes.
            let _ = trigger_tx.try_send(Trigger::startup());
        }

        self.handles.insert(
            project.name.clone(),
            ProjectHandle {
                shared,
                engine,
                trigger_tx,
                cancel_tx,
                coordinator,
            },
        );
    }

    /// Stop one project: watch engine first, then cancel in-flight work and
    /// let the coordinator terminate its supervised service.
    async fn stop_project(&mut self, name: &str) {
        let Some(handle) = self.handles.remove(name) else {
            return;
        };
        debug!(project = %name, "stopping project");

        if let Some(engine) = handle.engine {
            engine.stop();
        }
        let _ = handle.cancel_tx.send(true);
        drop(handle.trigger_tx);

        let mut coordinator = handle.coordinator;
        if tokio::time::timeout(Duration::from_secs(10), &mut coordinator)
            .await
            .is_err()
        {
            warn!(project = %name, "coordinator did not stop in time; aborting");
            coordinator.abort();
        }

        self.hub.unregister_project(name);
    }

    async fn shutdown_all(&mut self) {
        let names: Vec<String> = self.handles.keys().cloned().collect();
        for name in names {
            self.stop_project(&name).await;
        }
    }
}
