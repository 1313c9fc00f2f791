//! Workspace-level integration tests: a full device/collector handshake
//! and record exchange over real loopback TCP sockets, plus a
//! provisioning round trip. Telemetry-store filtering (the database
//! collaborator) is covered by `vaultkeep-collector`'s own unit tests —
//! it isn't exposed as a library from this workspace.

use std::path::PathBuf;

use vaultkeep_core::authenticator::{Authenticator, Role};
use vaultkeep_core::constants::{KEY_LEN, VAULT_SIZE};
use vaultkeep_core::crypto;
use vaultkeep_core::handshake::{collector_respond, device_initiate};
use vaultkeep_core::vault::{Vault, VaultEncKey, VaultStore};
use vaultkeep_core::Message;

/// Self-cleaning temp directory, since the core crate intentionally
/// carries no `tempfile` dev-dependency and this workspace test crate
/// doesn't need to either.
struct TempDir(PathBuf);

impl TempDir {
    fn new(label: &str) -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "vaultkeep-integration-{label}-{}-{}",
            std::process::id(),
            crypto::random_bytes(8).iter().map(|b| format!("{b:02x}")).collect::<String>()
        ));
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    fn path(&self) -> PathBuf {
        self.0.clone()
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn provision(store: &VaultStore, device_id: u32, n_keys: usize) -> VaultEncKey {
    let vault = Vault::from_keys((0..n_keys).map(|_| crypto::generate_key()).collect());
    let enc_key = VaultEncKey::generate();
    store.store(&vault, device_id, None).expect("write collector vault");
    store.store_vault_enc_key(device_id, &enc_key).expect("write vault-encryption key");
    store.store(&vault, device_id, Some(&enc_key)).expect("write device vault");
    enc_key
}

/// S7: a real device and a real collector, each owning their own
/// Authenticator, complete the four-message handshake over a loopback
/// TCP socket, then exchange one application record in each direction.
#[tokio::test]
async fn full_handshake_and_record_round_trip_over_loopback_tcp() {
    let dir = TempDir::new("s7");
    let store = VaultStore::new(dir.path());
    let device_id = 1058;
    let enc_key = provision(&store, device_id, VAULT_SIZE);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let collector_store = store.clone();
    let collector_task = tokio::spawn(async move {
        let (mut conn, _peer) = listener.accept().await.unwrap();

        // The real collector reads M1 itself to learn the claimed
        // identity before constructing an Authenticator; mirror that
        // here rather than reaching into the server module directly.
        let m1 = Message::read(&mut conn).await.unwrap();
        let mut collector =
            Authenticator::new(m1.device_id, Role::Collector, collector_store, m1.session_id).unwrap();

        collector_respond(&mut conn, &mut collector).await.unwrap();

        let msg = Message::read(&mut conn).await.unwrap();
        let plaintext = collector.decrypt(&msg).unwrap();

        let reply = collector.encrypt(b"ack");
        reply.write(&mut conn).await.unwrap();

        plaintext
    });

    let device_task = tokio::spawn(async move {
        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut device =
            Authenticator::new(device_id, Role::Device { vault_enc_key: enc_key }, store, 0).unwrap();

        device_initiate(&mut conn, &mut device).await.unwrap();

        let msg = device.encrypt(b"temperature=21.5,humidity=40.0");
        msg.write(&mut conn).await.unwrap();

        let reply = Message::read(&mut conn).await.unwrap();
        device.decrypt(&reply).unwrap()
    });

    let collector_saw = collector_task.await.unwrap();
    let device_saw = device_task.await.unwrap();

    assert_eq!(collector_saw, b"temperature=21.5,humidity=40.0");
    assert_eq!(device_saw, b"ack");
}

/// S8: provisioning's three files, read back through `VaultStore` on
/// both roles, yield byte-identical vaults.
#[tokio::test]
async fn provisioning_round_trip_yields_identical_vaults() {
    let dir = TempDir::new("s8");
    let store = VaultStore::new(dir.path());
    let device_id = 42;
    let enc_key = provision(&store, device_id, VAULT_SIZE);

    let collector_vault = store.load(device_id, None).unwrap();
    let device_vault = store.load(device_id, Some(&enc_key)).unwrap();

    assert_eq!(collector_vault.len(), VAULT_SIZE);
    assert_eq!(collector_vault, device_vault);

    let loaded_enc_key = store.load_vault_enc_key(device_id).unwrap();
    assert_eq!(loaded_enc_key.as_bytes(), enc_key.as_bytes());
    assert_eq!(loaded_enc_key.as_bytes().len(), KEY_LEN);
}

/// A wrong session_id on a record is rejected without mutating state,
/// exercised end to end over a real socket rather than in-process.
#[tokio::test]
async fn wrong_session_id_is_rejected_without_mutation_over_tcp() {
    let dir = TempDir::new("s5");
    let store = VaultStore::new(dir.path());
    let device_id = 7;
    let enc_key = provision(&store, device_id, 16);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let collector_store = store.clone();
    let collector_task = tokio::spawn(async move {
        let (mut conn, _peer) = listener.accept().await.unwrap();
        let m1 = Message::read(&mut conn).await.unwrap();
        let mut collector =
            Authenticator::new(m1.device_id, Role::Collector, collector_store, m1.session_id).unwrap();
        collector_respond(&mut conn, &mut collector).await.unwrap();

        let msg = Message::read(&mut conn).await.unwrap();
        let result = collector.decrypt(&msg);
        (result.is_err(), collector.time_lived())
    });

    let device_task = tokio::spawn(async move {
        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut device =
            Authenticator::new(device_id, Role::Device { vault_enc_key: enc_key }, store, 0).unwrap();
        device_initiate(&mut conn, &mut device).await.unwrap();

        let mut msg = device.encrypt(b"reading");
        msg.session_id += 1;
        msg.write(&mut conn).await.unwrap();
    });

    device_task.await.unwrap();
    let (rejected, time_lived_after) = collector_task.await.unwrap();

    assert!(rejected, "a record with the wrong session_id must be rejected");
    assert_eq!(time_lived_after, 0, "a rejected record must not be appended to the transcript");
}
