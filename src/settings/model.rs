// src/settings/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration document, persisted as TOML:
///
/// ```toml
/// [server]
/// host = "localhost"
/// port = 5002
///
/// [watch]
/// backend = "native"
/// debounce_ms = 300
///
/// [[project]]
/// name = "api"
/// path = "./api"
///
/// [[project.watch]]
/// paths = ["."]
/// extensions = [".go"]
///
/// [project.pipeline]
/// format = { status = true }
/// build = { status = true }
/// run = true
/// ```
///
/// The document is the single source of truth: it is loaded at startup,
/// replaced wholesale by dashboard edits, and written back through the
/// settings store. Project names must be unique (see `validate`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Dashboard server settings from `[server]`.
    #[serde(default)]
    pub server: ServerConfig,

    /// Watch strategy settings from `[watch]`.
    #[serde(default)]
    pub watch: WatchConfig,

    /// Ordered project list from `[[project]]`. The `projects` alias lets a
    /// dashboard session send a whole snapshot back as a replacement.
    #[serde(default, rename = "project", alias = "projects")]
    pub projects: Vec<Project>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            watch: WatchConfig::default(),
            projects: Vec::new(),
        }
    }
}

/// `[server]` section: where (and whether) the dashboard is served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Serve the dashboard at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Open the dashboard URL in a browser at startup.
    #[serde(default)]
    pub open: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5002
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            open: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

/// `[watch]` section: which change-notification strategy to use.
///
/// Backend selection is a configuration concern only — both backends yield
/// equivalent change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Scan interval for the polling backend.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Coalescing window: change events arriving within this window collapse
    /// into a single pipeline trigger.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Watch backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OS change notifications via `notify`.
    #[default]
    Native,
    /// Fixed-interval mtime scan-and-diff, for platforms/filesystems where
    /// native notifications are unreliable.
    Poll,
}

/// One `[[project]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    /// Working directory for every pipeline stage of this project.
    pub path: PathBuf,

    /// Watch specs from `[[project.watch]]`. A project with no specs is
    /// valid — its pipeline only runs once at startup.
    #[serde(default)]
    pub watch: Vec<WatchSpec>,

    #[serde(default)]
    pub pipeline: PipelineSpec,
}

/// One `[[project.watch]]` entry: which files feed triggers, plus script
/// hooks around the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WatchSpec {
    /// Directories to watch, relative to the project path.
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Allowed file extensions (e.g. `".go"`). Empty means every file.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Path prefixes (relative to the project path) excluded from watching.
    #[serde(default)]
    pub ignored_paths: Vec<PathBuf>,

    /// Log the list of watched files when the engine starts.
    #[serde(default)]
    pub preview: bool,

    /// Script hooks run around each pipeline execution.
    #[serde(default)]
    pub scripts: Vec<Script>,
}

/// A script hook attached to a watch spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(rename = "type")]
    pub kind: ScriptKind,

    /// Shell command line, run through the platform shell.
    pub command: String,

    /// Working directory override, relative to the project path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Stream the script's output into the project log buffer.
    #[serde(default)]
    pub output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    /// Runs ahead of the first pipeline stage.
    Before,
    /// Runs after the pipeline has succeeded through its last stage.
    After,
}

/// `[project.pipeline]`: per-stage toggles plus the `run` flag.
///
/// Stage order is fixed (format, vet, test, generate, install, build, run)
/// and not configurable; `run` is the only stage whose process outlives the
/// pipeline invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub format: StageToggle,
    #[serde(default)]
    pub vet: StageToggle,
    #[serde(default)]
    pub test: StageToggle,
    #[serde(default)]
    pub generate: StageToggle,
    #[serde(default)]
    pub install: StageToggle,
    #[serde(default)]
    pub build: StageToggle,

    /// Start the built binary as a supervised long-lived process.
    #[serde(default)]
    pub run: bool,
}

/// Enable flag + command for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageToggle {
    #[serde(default)]
    pub status: bool,

    /// Program override. When absent the stage runs `go <subcommand>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}
