//! The device-facing TCP accept loop and per-connection worker.
//!
//! One worker per accepted connection, one connection per device for the
//! connection's lifetime. The only state shared across workers is the
//! telemetry store and the live-session table that the duplicate-session
//! check reads; both are guarded the way `dashmap`/the store's internal
//! mutex already guard concurrent access — no extra locking here.

use std::sync::Arc;

use dashmap::DashSet;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use vaultkeep_core::authenticator::{Authenticator, Role};
use vaultkeep_core::telemetry::Telemetry;
use vaultkeep_core::vault::VaultStore;
use vaultkeep_core::{constants::TIME_TO_LIVE, handshake, AuthError, Message};

use crate::store::TelemetryStore;

/// Device ids with a live Authenticator on some connection right now.
/// Consulted by [`handle_connection`] to implement `DuplicateSession`.
pub type LiveSessions = Arc<DashSet<u32>>;

/// Bind `listen_host:listen_port` and accept device connections forever,
/// spawning one task per connection. Returns only if the listener itself
/// fails to bind.
pub async fn run_accept_loop(
    listen_host: &str,
    listen_port: u16,
    vault_store: VaultStore,
    telemetry: TelemetryStore,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind((listen_host, listen_port)).await?;
    info!(addr = %listener.local_addr()?, "collector listening");

    let live_sessions: LiveSessions = Arc::new(DashSet::new());

    loop {
        let (conn, peer_addr) = listener.accept().await?;
        let vault_store = vault_store.clone();
        let telemetry = telemetry.clone();
        let live_sessions = live_sessions.clone();

        tokio::spawn(async move {
            info!(%peer_addr, "connection accepted");
            match handle_connection(conn, vault_store, telemetry, live_sessions).await {
                Ok(()) => info!(%peer_addr, "connection closed normally"),
                Err(err) => warn!(%peer_addr, error = %err, "connection failed"),
            }
        });
    }
}

/// Drive one device connection end to end: read the claimed identity off
/// M1, refuse a duplicate, complete the handshake, then loop reading and
/// decrypting records (re-keying on `TIME_TO_LIVE`) until the peer closes.
async fn handle_connection(
    mut conn: TcpStream,
    vault_store: VaultStore,
    telemetry: TelemetryStore,
    live_sessions: LiveSessions,
) -> Result<(), AuthError> {
    let m1 = Message::read(&mut conn).await?;
    let device_id = m1.device_id;

    if !live_sessions.insert(device_id) {
        return Err(AuthError::DuplicateSession(device_id));
    }
    // Ensure the device id is released no matter how this worker exits.
    let _guard = LiveSessionGuard { live_sessions, device_id };

    let mut authenticator = Authenticator::new(device_id, Role::Collector, vault_store, m1.session_id)?;
    handshake::collector_respond(&mut conn, &mut authenticator).await?;
    info!(device_id, session_id = authenticator.session_id(), "device authenticated");

    loop {
        let msg = Message::read(&mut conn).await?;
        let plaintext = authenticator.decrypt(&msg)?;

        match Telemetry::decode(&plaintext) {
            Ok(reading) => {
                let timestamp = unix_timestamp();
                if let Err(err) = telemetry.append(
                    device_id,
                    authenticator.session_id(),
                    reading.state,
                    &reading.readings,
                    timestamp,
                ) {
                    warn!(device_id, error = %err, "failed to persist telemetry entry");
                }
            }
            Err(err) => warn!(device_id, error = %err, "dropping malformed telemetry payload"),
        }

        if authenticator.time_lived() == TIME_TO_LIVE {
            authenticator.reset()?;
            handshake::collector_respond(&mut conn, &mut authenticator).await?;
            info!(device_id, session_id = authenticator.session_id(), "device re-authenticated");
        }
    }
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Removes `device_id` from the live-session table when a connection
/// worker exits, successfully or not.
struct LiveSessionGuard {
    live_sessions: LiveSessions,
    device_id: u32,
}

impl Drop for LiveSessionGuard {
    fn drop(&mut self) {
        self.live_sessions.remove(&self.device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S6: a second M1 for a device id that already has a live
    /// Authenticator is refused, and the original holder is unaffected;
    /// once the original worker's guard drops, the id is free again.
    #[test]
    fn duplicate_device_id_is_refused_until_the_guard_drops() {
        let live_sessions: LiveSessions = Arc::new(DashSet::new());

        assert!(live_sessions.insert(1058));
        assert!(!live_sessions.insert(1058), "a second insert of the same id must be refused");

        let guard = LiveSessionGuard { live_sessions: live_sessions.clone(), device_id: 1058 };
        drop(guard);

        assert!(live_sessions.insert(1058), "the id must be free again once the holder's guard drops");
    }
}
