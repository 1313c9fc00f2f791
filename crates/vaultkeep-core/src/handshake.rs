//! The two scripted role programs that sequence a completed handshake:
//! one for the device (always the initiator) and one for the collector
//! (always the responder).
//!
//! Reading the claimed `(device_id, session_id)` out of M1 and deciding
//! whether it is a duplicate session is a collector-wide concern (it
//! needs the live-session table) and stays with the caller — by the
//! time [`collector_respond`] is called, the caller has already read M1,
//! checked for a duplicate, and constructed an [`Authenticator`] for the
//! claimed identity. [`device_initiate`] owns the whole exchange because
//! the device always starts it.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::debug;

use crate::authenticator::Authenticator;
use crate::challenge::Challenge;
use crate::crypto;
use crate::error::AuthError;
use crate::wire::Message;

/// Bound on a single handshake-phase read. Exceeding it surfaces as
/// `TransportClosed`, same as the peer simply vanishing.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

async fn read_with_timeout<S: AsyncRead + Unpin>(conn: &mut S) -> Result<Message, AuthError> {
    timeout(HANDSHAKE_TIMEOUT, Message::read(conn)).await.map_err(|_| AuthError::TransportClosed)?
}

/// Run the device side of the handshake to completion (M1 through M4) on
/// a freshly connected `conn`, using `authenticator` (already holding the
/// device's vault) to compose and validate every message.
///
/// On success the authenticator's session key is established and ready
/// for [`Authenticator::encrypt`]/[`Authenticator::decrypt`].
pub async fn device_initiate<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut S,
    authenticator: &mut Authenticator,
) -> Result<(), AuthError> {
    let device_id = authenticator.device_id();

    // M1: announce ourselves, unauthenticated.
    let m1 = authenticator.handshake(false, None, None, None);
    m1.write(conn).await?;
    debug!(device_id, "sent M1");

    // M2: collector's challenge.
    let m2 = read_with_timeout(conn).await?;
    if !authenticator.check_handshake(&m2) {
        return Err(AuthError::HandshakeFail("M2 failed handshake validation".into()));
    }
    let ch_c = Challenge::from_bytes(&m2.payload)?;
    let k1 = authenticator.solve_challenge(&ch_c, None);

    // Build our own challenge (forbidden from colliding with the
    // collector's), folding our session-key half in locally.
    let (k2_advertised, ch_d) = authenticator.generate_challenge(true, Some(ch_c.subset()));

    // M3: our answer to ch_C, our session-key half, and our own challenge,
    // all sealed under k1.
    let m3 = authenticator.handshake(true, Some(&k1), Some(ch_c.nonce()), Some(&ch_d));
    m3.write(conn).await?;
    debug!(device_id, "sent M3");

    // M4: the collector's answer to ch_D and its session-key half, sealed
    // under k2_advertised.
    let m4 = read_with_timeout(conn).await?;
    if !authenticator.check_handshake(&m4) {
        return Err(AuthError::HandshakeFail("M4 failed handshake validation".into()));
    }
    let opened = crypto::open(&k2_advertised, &m4.payload)
        .map_err(|_| AuthError::HandshakeFail("M4 decryption failed".into()))?;

    if opened.len() < 12 + 32 || !ch_d.verify(&opened[..12]) {
        return Err(AuthError::HandshakeFail("M4 nonce mismatch".into()));
    }
    let k_c: [u8; 32] = opened[12..44].try_into().unwrap();
    authenticator.feed_key(&k_c);

    debug!(device_id, session_id = authenticator.session_id(), "handshake established");
    Ok(())
}

/// Run the collector side of the handshake (M2 through M4) given an
/// `authenticator` already constructed for the identity claimed in M1.
///
/// The caller is responsible for having already read M1 (to learn the
/// claimed device/session id), checked for a duplicate session, and
/// constructed `authenticator` accordingly.
pub async fn collector_respond<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut S,
    authenticator: &mut Authenticator,
) -> Result<(), AuthError> {
    let device_id = authenticator.device_id();

    let (k1, ch_c) = authenticator.generate_challenge(false, None);
    let m2 = authenticator.handshake(false, None, None, Some(&ch_c));
    m2.write(conn).await?;
    debug!(device_id, "sent M2");

    let m3 = read_with_timeout(conn).await?;
    if !authenticator.check_handshake(&m3) {
        return Err(AuthError::HandshakeFail("M3 failed handshake validation".into()));
    }
    let opened = crypto::open(&k1, &m3.payload)
        .map_err(|_| AuthError::HandshakeFail("M3 decryption failed".into()))?;

    if opened.len() < 12 + 32 || !ch_c.verify(&opened[..12]) {
        return Err(AuthError::HandshakeFail("M3 nonce mismatch".into()));
    }
    let k_d: [u8; 32] = opened[12..44].try_into().unwrap();
    let ch_d = Challenge::from_bytes(&opened[44..])?;

    let k2 = authenticator.solve_challenge(&ch_d, Some(&k_d));
    authenticator.feed_key(&k_d);

    let m4 = authenticator.handshake(true, Some(&k2), Some(ch_d.nonce()), None);
    m4.write(conn).await?;
    debug!(device_id, "sent M4");

    debug!(device_id, session_id = authenticator.session_id(), "handshake established");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::Role;
    use crate::vault::{Vault, VaultEncKey, VaultStore};
    use tokio::io::duplex;

    struct TempDir(std::path::PathBuf);

    impl TempDir {
        fn new(label: &str) -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!(
                "vaultkeep-handshake-test-{label}-{}-{}",
                std::process::id(),
                crypto::random_bytes(8).iter().map(|b| format!("{b:02x}")).collect::<String>()
            ));
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[tokio::test]
    async fn device_and_collector_converge_over_an_in_memory_pipe() {
        let dir = TempDir::new("pipe");
        let store = VaultStore::new(dir.0.clone());
        let device_id = 2024;
        let vault = Vault::from_keys((0..32).map(|_| crypto::generate_key()).collect());
        let enc_key = VaultEncKey::generate();
        store.store(&vault, device_id, None).unwrap();
        store.store(&vault, device_id, Some(&enc_key)).unwrap();

        let (mut device_conn, mut collector_conn) = duplex(4096);

        let mut device =
            Authenticator::new(device_id, Role::Device { vault_enc_key: enc_key }, store.clone(), 0).unwrap();
        let mut collector = Authenticator::new(device_id, Role::Collector, store, 0).unwrap();

        let device_task = tokio::spawn(async move {
            device_initiate(&mut device_conn, &mut device).await.unwrap();
            device
        });
        let collector_task = tokio::spawn(async move {
            // In a real collector, M1 would be read here first to decide
            // the identity; for this test the identity is already known.
            let _m1 = read_with_timeout(&mut collector_conn).await.unwrap();
            collector_respond(&mut collector_conn, &mut collector).await.unwrap();
            collector
        });

        let mut device = device_task.await.unwrap();
        let mut collector = collector_task.await.unwrap();

        let msg = device.encrypt(b"temperature=21.5");
        let plain = collector.decrypt(&msg).unwrap();
        assert_eq!(plain, b"temperature=21.5");
    }
}
