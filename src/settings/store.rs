// src/settings/store.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::settings::model::ConfigDocument;
use crate::settings::validate::validate_document;

/// Settings persistence collaborator.
///
/// The sync hub invokes `save` on every accepted dashboard edit, and `load`
/// runs once at startup. Implementations other than [`TomlStore`] exist only
/// in tests.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<ConfigDocument>;
    fn save(&self, document: &ConfigDocument) -> Result<()>;
}

/// TOML file store.
#[derive(Debug, Clone)]
pub struct TomlStore {
    path: PathBuf,
}

impl TomlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlStore {
    fn load(&self) -> Result<ConfigDocument> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading config file at {:?}", self.path))?;

        let document: ConfigDocument = toml::from_str(&contents)
            .with_context(|| format!("parsing TOML config from {:?}", self.path))?;

        Ok(document)
    }

    fn save(&self, document: &ConfigDocument) -> Result<()> {
        let contents =
            toml::to_string_pretty(document).context("serializing config document to TOML")?;

        fs::write(&self.path, contents)
            .with_context(|| format!("writing config file at {:?}", self.path))?;

        Ok(())
    }
}

/// Load a configuration document from path and run structural validation.
///
/// This is the recommended entry point for startup:
/// - reads TOML (defaults applied by `serde` + `Default` impls),
/// - checks project names are present and unique,
/// - checks global watch/server sanity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigDocument> {
    let store = TomlStore::new(path.as_ref());
    let document = store.load()?;
    validate_document(&document).map_err(anyhow::Error::from)?;
    Ok(document)
}

/// Default config path: `Devloop.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Devloop.toml")
}
