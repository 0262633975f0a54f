// src/state.rs

//! Shared per-project state: status plus log buffer.
//!
//! Each `ProjectShared` is written by exactly one pipeline coordinator and
//! read concurrently by the sync hub for snapshot serialization. Lock scopes
//! are a single append or a single clone, so readers always observe whole
//! entries.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::logbuf::{BufferSnapshot, LogBuffer, LogEntry};
use crate::pipeline::stage::Stage;

/// Pipeline state machine position for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Idle,
    Running(Stage),
    Success,
    Failed(Stage),
    /// The supervised run process is alive.
    RunningService,
    /// Watching is disabled for this project (bad watch path or spec).
    ConfigError,
}

/// Status and logs for one project, shared between its coordinator (writer)
/// and the sync hub (reader).
#[derive(Debug)]
pub struct ProjectShared {
    status: RwLock<ProjectStatus>,
    logs: RwLock<LogBuffer>,
}

impl Default for ProjectShared {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectShared {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(ProjectStatus::Idle),
            logs: RwLock::new(LogBuffer::default()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn status(&self) -> ProjectStatus {
        *self.status.read().expect("status lock poisoned")
    }

    pub fn set_status(&self, status: ProjectStatus) {
        *self.status.write().expect("status lock poisoned") = status;
    }

    pub fn append(&self, entry: LogEntry) {
        self.logs.write().expect("log lock poisoned").append(entry);
    }

    pub fn buffer_snapshot(&self) -> BufferSnapshot {
        self.logs.read().expect("log lock poisoned").snapshot()
    }
}
