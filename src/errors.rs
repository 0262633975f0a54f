// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Stage failures and run-process crashes are recorded in the log buffer and
//! project status rather than raised as errors — a failing project must never
//! abort another project's watch/build cycle.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevloopError {
    /// Invalid or missing watch path, malformed document. Surfaced to the
    /// dashboard; disables watching for the affected project only.
    #[error("configuration error: {0}")]
    Config(String),

    /// Settings save failure. The in-memory document still reflects the
    /// attempted edit; the editing session gets this back as a warning.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Broadcast write failure to a dashboard session. Drops that session
    /// only.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevloopError {
    /// Short machine-readable kind for wire notices.
    pub fn kind(&self) -> &'static str {
        match self {
            DevloopError::Config(_) | DevloopError::TomlDe(_) => "configuration",
            DevloopError::Persistence(_) => "persistence",
            DevloopError::Transport(_) => "transport",
            DevloopError::Io(_) => "io",
            DevloopError::TomlSer(_) => "serialization",
            DevloopError::Other(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, DevloopError>;
