// src/sync/mod.rs

//! Live dashboard synchronization: state hub, WebSocket/asset server,
//! bundled UI assets.

pub mod assets;
pub mod hub;
pub mod server;

pub use hub::{ErrorNotice, Hub, ProjectView, Snapshot, SyncNotifier};
pub use server::{serve, serve_with_ready};
