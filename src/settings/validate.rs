// src/settings/validate.rs

use std::collections::HashSet;

use crate::errors::DevloopError;
use crate::settings::model::ConfigDocument;

/// Run structural validation against a configuration document.
///
/// This checks:
/// - every project has a non-empty name and a non-empty path
/// - project names are unique within the document
/// - `debounce_ms` and `poll_interval_ms` are non-zero
///
/// It does **not** check that watch paths exist — a missing path is a
/// per-project runtime error that must not reject the whole document.
pub fn validate_document(document: &ConfigDocument) -> Result<(), DevloopError> {
    validate_globals(document)?;
    validate_projects(document)?;
    Ok(())
}

fn validate_globals(document: &ConfigDocument) -> Result<(), DevloopError> {
    if document.watch.debounce_ms == 0 {
        return Err(DevloopError::Config(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if document.watch.poll_interval_ms == 0 {
        return Err(DevloopError::Config(
            "[watch].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_projects(document: &ConfigDocument) -> Result<(), DevloopError> {
    let mut seen: HashSet<&str> = HashSet::new();

    for project in &document.projects {
        if project.name.trim().is_empty() {
            return Err(DevloopError::Config(
                "every [[project]] must have a non-empty name".to_string(),
            ));
        }
        if !seen.insert(project.name.as_str()) {
            return Err(DevloopError::Config(format!(
                "duplicate project name '{}'",
                project.name
            )));
        }
        if project.path.as_os_str().is_empty() {
            return Err(DevloopError::Config(format!(
                "project '{}' must have a non-empty path",
                project.name
            )));
        }
        for script in project.watch.iter().flat_map(|spec| spec.scripts.iter()) {
            if script.command.trim().is_empty() {
                return Err(DevloopError::Config(format!(
                    "project '{}' has a script with an empty command",
                    project.name
                )));
            }
        }
    }

    Ok(())
}
