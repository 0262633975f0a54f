// src/watch/filter.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::DevloopError;
use crate::settings::model::WatchSpec;

/// Compiled path filter for one watch spec.
///
/// A path is interesting when it lives under one of the configured roots,
/// carries an allowed extension, and is not under any ignored prefix. Roots
/// are canonicalized at construction so they compare cleanly against the
/// absolute paths both backends deliver.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    ignored: Vec<PathBuf>,
}

impl WatchFilter {
    /// Build a filter from a watch spec, resolving paths against the
    /// project directory. A configured path that does not exist is a
    /// configuration error — the caller disables watching for this project
    /// and leaves every other project alone.
    pub fn from_spec(workdir: &Path, spec: &WatchSpec) -> Result<Self, DevloopError> {
        let mut roots = Vec::new();

        let configured: Vec<PathBuf> = if spec.paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            spec.paths.clone()
        };

        for path in &configured {
            let joined = workdir.join(path);
            let canonical = joined.canonicalize().map_err(|err| {
                DevloopError::Config(format!("watch path {joined:?} is not accessible: {err}"))
            })?;
            roots.push(canonical);
        }

        let ignored = spec
            .ignored_paths
            .iter()
            .map(|path| {
                let joined = workdir.join(path);
                // Ignored paths may not exist yet; keep the joined form when
                // canonicalization fails.
                joined.canonicalize().unwrap_or(joined)
            })
            .collect();

        let extensions = spec
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self {
            roots,
            extensions,
            ignored,
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Whether a changed path should feed a trigger.
    pub fn matches(&self, path: &Path) -> bool {
        if !self.roots.iter().any(|root| path.starts_with(root)) {
            return false;
        }
        if self.ignored.iter().any(|prefix| path.starts_with(prefix)) {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }

    /// Walk the roots and collect every currently-matching file. Used for
    /// the preview listing at engine start.
    pub fn walk_matching(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for root in &self.roots {
            collect_files(root, &mut |path| {
                if self.matches(path) {
                    found.push(path.to_path_buf());
                }
            });
        }
        found.sort();
        found.dedup();
        found
    }
}

fn collect_files(dir: &Path, visit: &mut impl FnMut(&Path)) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, visit);
        } else {
            visit(&path);
        }
    }
}
