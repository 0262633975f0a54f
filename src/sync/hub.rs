// src/sync/hub.rs

//! Fan-out state synchronization.
//!
//! The hub holds the read side of the shared state: the current
//! configuration document and each project's status/log buffers. State
//! changes are announced as payload-free events on a broadcast channel;
//! every dashboard session re-serializes the full current snapshot on
//! receipt, so delivery only needs at-least-once / latest-wins semantics.
//! Inbound document edits are routed to the orchestrator's mutation gate —
//! the hub itself never mutates the document.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::errors::DevloopError;
use crate::logbuf::BufferSnapshot;
use crate::orchestrator::ControlEvent;
use crate::settings::model::{ConfigDocument, Project, ServerConfig, WatchConfig};
use crate::state::{ProjectShared, ProjectStatus};

/// Broadcasts payload-free "state changed" events to all sessions.
///
/// No subscribers is fine; a lagging subscriber drops missed events and
/// catches up with one fresh snapshot.
#[derive(Debug, Clone)]
pub struct SyncNotifier {
    tx: broadcast::Sender<()>,
}

impl SyncNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn notify(&self) {
        let _ = self.tx.send(());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for SyncNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-side registry shared between the orchestrator (writer) and the
/// dashboard sessions (readers).
pub struct Hub {
    document: RwLock<ConfigDocument>,
    projects: RwLock<HashMap<String, Arc<ProjectShared>>>,
    notifier: SyncNotifier,
    control_tx: mpsc::Sender<ControlEvent>,
}

impl Hub {
    pub fn new(document: ConfigDocument, control_tx: mpsc::Sender<ControlEvent>) -> Arc<Self> {
        Arc::new(Self {
            document: RwLock::new(document),
            projects: RwLock::new(HashMap::new()),
            notifier: SyncNotifier::new(),
            control_tx,
        })
    }

    pub fn notifier(&self) -> SyncNotifier {
        self.notifier.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notifier.subscribe()
    }

    /// Clone of the current document.
    pub fn document(&self) -> ConfigDocument {
        self.document.read().expect("document lock poisoned").clone()
    }

    pub(crate) fn replace_document(&self, document: ConfigDocument) {
        *self.document.write().expect("document lock poisoned") = document;
    }

    pub(crate) fn register_project(&self, name: &str, shared: Arc<ProjectShared>) {
        self.projects
            .write()
            .expect("project registry lock poisoned")
            .insert(name.to_string(), shared);
    }

    pub(crate) fn unregister_project(&self, name: &str) {
        self.projects
            .write()
            .expect("project registry lock poisoned")
            .remove(name);
    }

    /// Build the full wholesale snapshot: the document with per-project
    /// status and log buffers embedded.
    pub fn snapshot(&self) -> Snapshot {
        let ConfigDocument {
            server,
            watch,
            projects,
        } = self.document();
        let registry = self.projects.read().expect("project registry lock poisoned");

        let projects = projects
            .into_iter()
            .map(|project| {
                let (status, buffer) = registry
                    .get(&project.name)
                    .map(|shared| (shared.status(), shared.buffer_snapshot()))
                    .unwrap_or_default();
                ProjectView {
                    project,
                    status,
                    buffer,
                }
            })
            .collect();

        Snapshot {
            server,
            watch,
            projects,
        }
    }

    pub fn snapshot_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Route a replacement document through the orchestrator's gate and wait
    /// for the outcome.
    pub async fn submit_edit(&self, document: ConfigDocument) -> Result<(), DevloopError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(ControlEvent::ReplaceDocument {
                document,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DevloopError::Transport("orchestrator is not running".to_string()))?;

        reply_rx
            .await
            .map_err(|_| DevloopError::Transport("orchestrator dropped the edit".to_string()))?
    }
}

/// Whole-state wire snapshot. A client may edit it and send it straight
/// back: deserializing into [`ConfigDocument`] ignores the embedded
/// status/buffer fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub server: ServerConfig,
    pub watch: WatchConfig,
    pub projects: Vec<ProjectView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub buffer: BufferSnapshot,
}

/// Error notice sent to the session that caused a failed edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub error: NoticeBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeBody {
    pub kind: String,
    pub message: String,
}

impl ErrorNotice {
    pub fn from_error(err: &DevloopError) -> Self {
        Self {
            error: NoticeBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
