// src/lib.rs

pub mod browser;
pub mod cli;
pub mod errors;
pub mod logbuf;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod settings;
pub mod state;
pub mod sync;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::orchestrator::{ControlEvent, Orchestrator};
use crate::pipeline::stage::plan;
use crate::settings::model::ConfigDocument;
use crate::settings::store::{SettingsStore, TomlStore, load_and_validate};
use crate::sync::hub::Hub;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading + validation
/// - the orchestrator (project watch/pipeline tasks, edit gate)
/// - the dashboard server and sync hub
/// - browser launch
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let document = load_and_validate(&args.config)?;
    let store = TomlStore::new(&args.config);

    if args.dry_run {
        print_dry_run(&document);
        return Ok(());
    }

    // Control channel into the orchestrator's mutation gate.
    let (control_tx, control_rx) = mpsc::channel::<ControlEvent>(16);
    let hub = Hub::new(document.clone(), control_tx.clone());

    // Ctrl-C → graceful shutdown.
    {
        let tx = control_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {err}");
                return;
            }
            let _ = tx.send(ControlEvent::Shutdown).await;
        });
    }

    // Dashboard server + optional browser launch.
    if document.server.enabled && !args.no_server {
        let addr = format!("{}:{}", document.server.host, document.server.port);
        let url = format!("http://{addr}");

        let server_hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(err) = sync::server::serve(server_hub, addr).await {
                error!(error = %err, "dashboard server failed");
            }
        });

        if document.server.open || args.open {
            if let Err(err) = browser::open(&url) {
                warn!(error = %err, "could not open browser");
            }
        }
        info!(url = %url, "dashboard enabled");
    }

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Orchestrator::new(hub, store, control_rx).run().await
}

/// Simple dry-run output: print projects, watch specs and pipelines.
fn print_dry_run(document: &ConfigDocument) {
    println!("devloop dry-run");
    println!(
        "  server: enabled={} host={} port={}",
        document.server.enabled, document.server.host, document.server.port
    );
    println!(
        "  watch: backend={:?} debounce_ms={} poll_interval_ms={}",
        document.watch.backend, document.watch.debounce_ms, document.watch.poll_interval_ms
    );
    println!();

    println!("projects ({}):", document.projects.len());
    for project in &document.projects {
        println!("  - {}", project.name);
        println!("      path: {:?}", project.path);
        for spec in &project.watch {
            println!(
                "      watch: paths={:?} extensions={:?} ignored={:?}",
                spec.paths, spec.extensions, spec.ignored_paths
            );
        }
        for stage in plan(&project.pipeline) {
            println!(
                "      stage {}: {} {}",
                stage.stage,
                stage.program,
                stage.args.join(" ")
            );
        }
        if project.pipeline.run {
            println!("      run: true");
        }
    }
}
