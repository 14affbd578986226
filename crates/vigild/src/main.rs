//! Vigil daemon binary entrypoint.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vigil_alerts::SnapshotStore;
use vigil_config::{ConfigDocument, SharedConfig};
use vigil_metrics::{InMemoryMetricSource, MetricSource};
use vigil_notify::{Dispatcher, DispatcherStats, RetryPolicy};

use vigild::cli::Cli;
use vigild::engine::Engine;
use vigild::routes::create_router;
use vigild::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let document = ConfigDocument::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let compiled = document.validate().context("configuration invalid")?;

    if cli.check {
        println!(
            "{}: ok ({} SLIs, {} SLOs, {} receivers)",
            cli.config.display(),
            compiled.slis.len(),
            compiled.objectives.len(),
            compiled.receivers.len()
        );
        return Ok(());
    }

    info!(
        config = %cli.config.display(),
        slis = compiled.slis.len(),
        slos = compiled.objectives.len(),
        receivers = compiled.receivers.len(),
        "configuration loaded"
    );

    let config = SharedConfig::new(Arc::new(compiled));
    let source: Arc<dyn MetricSource> = Arc::new(InMemoryMetricSource::new());
    let stats = Arc::new(DispatcherStats::new());
    let dispatcher = Dispatcher::new(RetryPolicy::default(), Arc::clone(&stats));
    let snapshots = cli
        .state_dir
        .as_ref()
        .map(|dir| SnapshotStore::new(dir.join("state.json")));

    let (engine, worker) = Engine::new(config.clone(), source, dispatcher, snapshots, Utc::now());
    engine.restore_persisted();

    let state = AppState::new(&cli.config, config, Arc::clone(&engine), stats);
    let router = create_router(state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_task = tokio::spawn(worker.run());
    let engine_task = tokio::spawn(Arc::clone(&engine).run(shutdown_rx));

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!(addr = %cli.listen, "API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = engine_task.await {
        warn!(error = %err, "evaluation loop ended abnormally");
    }
    worker_task.abort();
    info!("vigild stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; park instead of exiting early.
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
