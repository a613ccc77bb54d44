use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use pocketplan_server::scheduler::spawn_retention_pruner;
use pocketplan_server::{app_router, build_state, ServerConfig};
use pocketplan_storage_sqlite::Database;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[Server] Failed to listen for shutdown signal: {}", e);
    }
    info!("[Server] Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let database = Database::open(&config.data_dir)
        .with_context(|| format!("failed to open database in {}", config.data_dir))?;
    let state = build_state(config.clone(), &database)?;

    let pruners: Vec<_> = state
        .plan_services()
        .into_iter()
        .map(|service| spawn_retention_pruner(service, config.prune_interval))
        .collect();

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(
        "[Server] Listening on {} ({:?}, db {})",
        config.listen_addr,
        config.environment,
        database.path()
    );

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for pruner in pruners {
        pruner.abort();
    }
    tokio::task::spawn_blocking(move || database.close())
        .await
        .context("database close task failed")?;
    info!("[Server] Stopped");
    Ok(())
}
