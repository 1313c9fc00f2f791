//! vaultkeep-collector — the central collector role program: accepts
//! device connections, authenticates them, and persists their telemetry.

mod config;
mod server;
mod store;
mod terminal;

use anyhow::{Context, Result};
use vaultkeep_core::vault::VaultStore;

use config::CollectorConfig;
use store::TelemetryStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = CollectorConfig::load().context("loading collector config")?;
    tracing::info!(host = %config.listen_host, port = config.listen_port, db = %config.db_path.display(), "vaultkeep-collector starting");

    let vault_store = VaultStore::new(config.vault_dir.clone());
    let telemetry = TelemetryStore::open(&config.db_path)
        .with_context(|| format!("opening telemetry store at {}", config.db_path.display()))?;

    let accept_task = {
        let vault_store = vault_store.clone();
        let telemetry = telemetry.clone();
        let host = config.listen_host.clone();
        let port = config.listen_port;
        tokio::spawn(async move { server::run_accept_loop(&host, port, vault_store, telemetry).await })
    };

    let terminal_telemetry = telemetry.clone();
    let terminal_task = tokio::task::spawn_blocking(move || terminal::run(&terminal_telemetry));

    tokio::select! {
        result = accept_task => {
            if let Ok(Err(err)) = result {
                tracing::error!(error = %err, "accept loop exited");
            }
        }
        _ = terminal_task => {
            tracing::info!("operator requested exit");
        }
    }

    Ok(())
}
