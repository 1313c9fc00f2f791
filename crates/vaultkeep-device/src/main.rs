//! vaultkeep-device — the IoT device role program: connects to a
//! collector, authenticates, and streams simulated telemetry.

mod config;
mod sensor;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio::time::sleep;

use vaultkeep_core::authenticator::{Authenticator, Role};
use vaultkeep_core::vault::VaultStore;
use vaultkeep_core::{constants::TIME_TO_LIVE, handshake, AuthError};

use config::DeviceConfig;
use sensor::SensorController;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = DeviceConfig::load().context("loading device config")?;
    tracing::info!(device_id = config.device_id, host = %config.collector_host, port = config.collector_port, "vaultkeep-device starting");

    let store = VaultStore::new(config.vault_dir.clone());
    let mut controller = SensorController::thermometer();

    loop {
        match run_connection(&config, &store, &mut controller).await {
            Ok(()) => tracing::info!("connection closed normally"),
            Err(err) => tracing::warn!(error = %err, "connection failed"),
        }
        tracing::info!(backoff_secs = config.reconnect_backoff_secs, "reconnecting after backoff");
        sleep(Duration::from_secs(config.reconnect_backoff_secs)).await;
    }
}

async fn run_connection(
    config: &DeviceConfig,
    store: &VaultStore,
    controller: &mut SensorController,
) -> Result<(), AuthError> {
    let vault_enc_key = store.load_vault_enc_key(config.device_id)?;
    let mut authenticator =
        Authenticator::new(config.device_id, Role::Device { vault_enc_key }, store.clone(), 0)?;

    let mut conn = TcpStream::connect((config.collector_host.as_str(), config.collector_port))
        .await
        .map_err(|_| AuthError::TransportClosed)?;

    handshake::device_initiate(&mut conn, &mut authenticator).await?;
    tracing::info!(device_id = config.device_id, "authenticated with collector");

    loop {
        sleep(Duration::from_secs(config.sample_interval_secs)).await;

        controller.change_state();
        let payload = controller.read_device_bytes();
        let msg = authenticator.encrypt(&payload);
        msg.write(&mut conn).await?;

        if authenticator.time_lived() == TIME_TO_LIVE {
            authenticator.reset()?;
            handshake::device_initiate(&mut conn, &mut authenticator).await?;
            tracing::info!(device_id = config.device_id, session_id = authenticator.session_id(), "re-authenticated");
        }
    }
}
