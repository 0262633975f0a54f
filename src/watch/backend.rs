// src/watch/backend.rs

//! Change-notification backends.
//!
//! Two interchangeable strategies sit behind [`WatchBackend`]: native OS
//! notifications via `notify`, and a fixed-interval mtime scan for
//! platforms/filesystems where native notifications are unreliable (network
//! mounts, some containers). Selection is configuration, not behavior — both
//! deliver the same [`ChangeEvent`] stream.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::settings::model::{BackendKind, WatchConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// One file-system change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// A source of change events for a set of root directories.
///
/// The backend owns whatever OS resources or background tasks it needs;
/// dropping it stops event delivery.
pub trait WatchBackend: Send {
    fn name(&self) -> &'static str;

    /// Begin delivering events for files under `roots` into `tx`.
    fn start(&mut self, roots: &[PathBuf], tx: mpsc::UnboundedSender<ChangeEvent>) -> Result<()>;
}

/// Construct the configured backend.
pub fn backend_for(config: &WatchConfig) -> Box<dyn WatchBackend> {
    match config.backend {
        BackendKind::Native => Box::new(NativeBackend::new()),
        BackendKind::Poll => Box::new(PollBackend::new(Duration::from_millis(
            config.poll_interval_ms,
        ))),
    }
}

// ── native ───────────────────────────────────────────────────────────────

/// OS change notifications. The underlying `RecommendedWatcher` must stay
/// alive for as long as events are wanted.
pub struct NativeBackend {
    watcher: Option<RecommendedWatcher>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self { watcher: None }
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn start(&mut self, roots: &[PathBuf], tx: mpsc::UnboundedSender<ChangeEvent>) -> Result<()> {
        // Bridge from notify's synchronous callback into the async world.
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(err) => {
                    // tracing is not reliably usable from notify's thread.
                    eprintln!("devloop: file watch error: {err}");
                }
            },
            Config::default(),
        )?;

        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let Some(kind) = map_kind(&event.kind) else {
                    continue;
                };
                for path in event.paths {
                    if tx.send(ChangeEvent { path, kind }).is_err() {
                        debug!("change event consumer gone; stopping forward loop");
                        return;
                    }
                }
            }
        });

        self.watcher = Some(watcher);
        Ok(())
    }
}

fn map_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(_) => None,
    }
}

// ── polling ──────────────────────────────────────────────────────────────

/// Fixed-interval scan-and-diff of file mtimes under the roots.
pub struct PollBackend {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl PollBackend {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }
}

impl WatchBackend for PollBackend {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn start(&mut self, roots: &[PathBuf], tx: mpsc::UnboundedSender<ChangeEvent>) -> Result<()> {
        let roots = roots.to_vec();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            // First scan primes the baseline; no events for pre-existing files.
            let mut seen = scan_mtimes(&roots);

            loop {
                tokio::time::sleep(interval).await;
                let current = scan_mtimes(&roots);

                for (path, mtime) in &current {
                    let event = match seen.get(path) {
                        None => Some(ChangeEvent {
                            path: path.clone(),
                            kind: ChangeKind::Created,
                        }),
                        Some(old) if old != mtime => Some(ChangeEvent {
                            path: path.clone(),
                            kind: ChangeKind::Modified,
                        }),
                        Some(_) => None,
                    };
                    if let Some(event) = event {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }

                for path in seen.keys() {
                    if !current.contains_key(path) {
                        let event = ChangeEvent {
                            path: path.clone(),
                            kind: ChangeKind::Removed,
                        };
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }

                seen = current;
            }
        });

        self.task = Some(task);
        Ok(())
    }
}

impl Drop for PollBackend {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn scan_mtimes(roots: &[PathBuf]) -> HashMap<PathBuf, SystemTime> {
    let mut mtimes = HashMap::new();
    for root in roots {
        scan_dir(root, &mut mtimes);
    }
    mtimes
}

fn scan_dir(dir: &Path, mtimes: &mut HashMap<PathBuf, SystemTime>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(?dir, error = %err, "poll scan could not read directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, mtimes);
        } else if let Ok(metadata) = entry.metadata() {
            if let Ok(mtime) = metadata.modified() {
                mtimes.insert(path, mtime);
            }
        }
    }
}
