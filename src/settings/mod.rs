// src/settings/mod.rs

//! Configuration document: model, persistence, validation.
//!
//! The document is exclusively owned by the orchestrator; the sync hub reads
//! it for serialization and routes inbound edits back through the
//! orchestrator's gate.

pub mod model;
pub mod store;
pub mod validate;

pub use model::{
    BackendKind, ConfigDocument, PipelineSpec, Project, Script, ScriptKind, ServerConfig,
    StageToggle, WatchConfig, WatchSpec,
};
pub use store::{SettingsStore, TomlStore, default_config_path, load_and_validate};
pub use validate::validate_document;
