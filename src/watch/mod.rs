// src/watch/mod.rs

//! File watching: backends, path filtering, debounced trigger production.

pub mod backend;
pub mod engine;
pub mod filter;

pub use backend::{ChangeEvent, ChangeKind, WatchBackend, backend_for};
pub use engine::{WatchEngineHandle, debounce_loop, spawn};
pub use filter::WatchFilter;
