// src/pipeline/mod.rs

//! Pipeline execution layer.
//!
//! - [`stage`] fixes stage ordering and resolves toggles to invocations.
//! - [`runner`] spawns one command with streaming capture and cancellation.
//! - [`service`] supervises the long-lived run process.
//! - [`coordinator`] is the per-project task driving all of the above.

pub mod coordinator;
pub mod runner;
pub mod service;
pub mod stage;

pub use coordinator::{Trigger, TriggerReason};
pub use runner::{GRACE_PERIOD, StageReport};
pub use stage::{Stage, StagePlan};
