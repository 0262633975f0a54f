use std::error::Error;
use std::path::PathBuf;

use devloop::settings::model::{
    BackendKind, ConfigDocument, Project, WatchSpec,
};
use devloop::settings::store::{SettingsStore, TomlStore};
use devloop::settings::validate::validate_document;

type TestResult = Result<(), Box<dyn Error>>;

fn sample_document() -> ConfigDocument {
    let mut document = ConfigDocument::default();
    document.server.port = 5050;
    document.watch.backend = BackendKind::Poll;
    document.watch.debounce_ms = 150;
    document.projects.push(Project {
        name: "api".to_string(),
        path: PathBuf::from("./api"),
        watch: vec![WatchSpec {
            paths: vec![PathBuf::from("src")],
            extensions: vec![".go".to_string()],
            ignored_paths: vec![PathBuf::from("src/vendor")],
            ..Default::default()
        }],
        pipeline: Default::default(),
    });
    document
}

#[test]
fn toml_layout_parses_into_the_document_model() -> TestResult {
    let raw = r#"
[server]
port = 5050

[watch]
backend = "poll"
debounce_ms = 150

[[project]]
name = "api"
path = "./api"

[[project.watch]]
paths = ["src"]
extensions = [".go"]
ignored_paths = ["src/vendor"]

[[project.watch.scripts]]
type = "before"
command = "echo pre"
output = true

[project.pipeline]
run = true

[project.pipeline.format]
status = true

[project.pipeline.build]
status = true
args = ["-v"]
"#;

    let document: ConfigDocument = toml::from_str(raw)?;

    assert_eq!(document.server.port, 5050);
    assert_eq!(document.watch.backend, BackendKind::Poll);
    assert_eq!(document.watch.debounce_ms, 150);
    // Omitted fields fall back to defaults.
    assert_eq!(document.server.host, "localhost");
    assert_eq!(document.watch.poll_interval_ms, 1000);

    assert_eq!(document.projects.len(), 1);
    let project = &document.projects[0];
    assert_eq!(project.name, "api");
    assert_eq!(project.watch.len(), 1);
    assert_eq!(project.watch[0].extensions, vec![".go"]);
    assert_eq!(project.watch[0].scripts.len(), 1);
    assert!(project.pipeline.run);
    assert!(project.pipeline.format.status);
    assert!(project.pipeline.build.status);
    assert_eq!(project.pipeline.build.args, vec!["-v"]);
    assert!(!project.pipeline.vet.status);

    Ok(())
}

#[test]
fn save_then_load_round_trips_the_document() -> TestResult {
    let dir = tempfile::tempdir()?;
    let store = TomlStore::new(dir.path().join("Devloop.toml"));

    let document = sample_document();
    store.save(&document)?;
    let loaded = store.load()?;

    assert_eq!(loaded, document);
    Ok(())
}

#[test]
fn loading_a_missing_file_errors() -> TestResult {
    let dir = tempfile::tempdir()?;
    let store = TomlStore::new(dir.path().join("nope.toml"));
    assert!(store.load().is_err());
    Ok(())
}

#[test]
fn duplicate_project_names_are_rejected() -> TestResult {
    let mut document = sample_document();
    let mut twin = document.projects[0].clone();
    twin.watch.clear();
    document.projects.push(twin);

    let err = validate_document(&document).unwrap_err();
    assert!(err.to_string().contains("duplicate project name"));
    Ok(())
}

#[test]
fn empty_names_and_paths_are_rejected() -> TestResult {
    let mut document = sample_document();
    document.projects[0].name = "  ".to_string();
    assert!(validate_document(&document).is_err());

    let mut document = sample_document();
    document.projects[0].path = PathBuf::new();
    assert!(validate_document(&document).is_err());

    Ok(())
}

#[test]
fn zero_debounce_is_rejected() -> TestResult {
    let mut document = sample_document();
    document.watch.debounce_ms = 0;
    assert!(validate_document(&document).is_err());
    Ok(())
}

#[test]
fn a_wire_snapshot_deserializes_as_a_replacement_document() -> TestResult {
    // Dashboard sessions send snapshots straight back; the embedded status
    // and buffer fields must be ignored on the way in.
    let raw = r#"{
        "server": {"enabled": true, "open": false, "host": "localhost", "port": 5002},
        "watch": {"backend": "native", "poll_interval_ms": 1000, "debounce_ms": 300},
        "projects": [
            {
                "name": "api",
                "path": "./api",
                "watch": [],
                "pipeline": {"run": true},
                "status": {"state": "success"},
                "buffer": {"stdOut": [], "stdLog": [], "stdErr": []}
            }
        ]
    }"#;

    let document: ConfigDocument = serde_json::from_str(raw)?;
    assert_eq!(document.projects.len(), 1);
    assert_eq!(document.projects[0].name, "api");
    assert!(document.projects[0].pipeline.run);
    Ok(())
}
