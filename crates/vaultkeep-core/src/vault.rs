//! Vault storage — the ordered list of shared symmetric keys a device and
//! the collector both hold, and the files that back it on disk.
//!
//! Layout on disk (rooted at a configurable base directory, default the
//! current working directory):
//!
//! ```text
//! svVaults/<device_id>   raw concatenation of VAULT_SIZE 32-byte keys (collector)
//! dvVaults/<device_id>   nonce(12) ‖ AEAD-seal(concatenation)         (device)
//! dvKeys/<device_id>     raw 32-byte vault-encryption key             (device)
//! ```
//!
//! Writes are atomic: write to a temp file in the same directory, then
//! rename over the target, so a concurrent reader never observes a
//! partially written vault.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{KEY_LEN, PATH_DV_KEYS, PATH_DV_VAULTS, PATH_SV_VAULTS};
use crate::crypto::{self, open_storage};
use crate::error::AuthError;

/// The 32-byte key known only to one device, used to seal its vault file
/// at rest. Zeroized on drop — this never touches the wire.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultEncKey([u8; KEY_LEN]);

impl VaultEncKey {
    /// Generate a fresh random vault-encryption key.
    pub fn generate() -> Self {
        Self(crypto::generate_key())
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for VaultEncKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultEncKey").field("key", &"[REDACTED]").finish()
    }
}

/// An ordered list of fixed-size symmetric keys, byte-identical on both
/// peers for a given device.
#[derive(Clone, PartialEq, Eq)]
pub struct Vault {
    keys: Vec<[u8; KEY_LEN]>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").field("key_count", &self.keys.len()).finish()
    }
}

impl Vault {
    /// Build a vault from an already-materialized list of keys. Used by
    /// provisioning and by tests; normal loads go through [`VaultStore`].
    pub fn from_keys(keys: Vec<[u8; KEY_LEN]>) -> Self {
        Self { keys }
    }

    /// Number of keys in the vault.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The key at `index`. Panics if out of range — callers (the
    /// challenge solver) only ever index with values already checked
    /// against `len()` at draw time.
    pub fn get(&self, index: usize) -> &[u8; KEY_LEN] {
        &self.keys[index]
    }

    /// Concatenate every key, in order, into one byte stream. This is
    /// both the collector's on-disk format and the input to the rotation
    /// HMAC.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.keys.len() * KEY_LEN);
        for key in &self.keys {
            out.extend_from_slice(key);
        }
        out
    }

    /// Slice a flat byte buffer into `KEY_LEN`-sized keys.
    ///
    /// Fails with `VaultCorrupt` if `bytes` is empty or its length is not
    /// a multiple of `KEY_LEN`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuthError> {
        if bytes.is_empty() || bytes.len() % KEY_LEN != 0 {
            return Err(AuthError::VaultCorrupt(format!(
                "vault length {} is not a positive multiple of {KEY_LEN}",
                bytes.len()
            )));
        }
        let keys = bytes.chunks_exact(KEY_LEN).map(|chunk| chunk.try_into().unwrap()).collect();
        Ok(Self { keys })
    }

    /// XOR every key in place with the same `tag`. Used by rotation
    /// (§4.3 step 4 of the spec) — every entry gets the same tag, by
    /// design (see the design notes on rotation tag reuse).
    pub fn xor_rotate(&mut self, tag: &[u8; 32]) {
        for key in &mut self.keys {
            crypto::xor_in_place(key, tag);
        }
    }
}

/// Loads and persists vaults for either peer role.
///
/// The collector passes `None` for `enc_key` everywhere (its vaults are
/// stored raw); the device always passes `Some`.
#[derive(Clone, Debug)]
pub struct VaultStore {
    base_dir: PathBuf,
}

impl VaultStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn sv_path(&self, device_id: u32) -> PathBuf {
        self.base_dir.join(PATH_SV_VAULTS).join(device_id.to_string())
    }

    fn dv_path(&self, device_id: u32) -> PathBuf {
        self.base_dir.join(PATH_DV_VAULTS).join(device_id.to_string())
    }

    fn dv_key_path(&self, device_id: u32) -> PathBuf {
        self.base_dir.join(PATH_DV_KEYS).join(device_id.to_string())
    }

    /// Read the device-side vault-encryption key for `device_id`.
    pub fn load_vault_enc_key(&self, device_id: u32) -> Result<VaultEncKey, AuthError> {
        let bytes = fs::read(self.dv_key_path(device_id))?;
        if bytes.len() != KEY_LEN {
            return Err(AuthError::VaultCorrupt(format!(
                "vault-encryption key for device {device_id} is {} bytes, expected {KEY_LEN}",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(VaultEncKey::from_bytes(key))
    }

    /// Load a vault. `enc_key` is `None` for the collector role (raw
    /// file), `Some` for the device role (AEAD-sealed file).
    pub fn load(&self, device_id: u32, enc_key: Option<&VaultEncKey>) -> Result<Vault, AuthError> {
        match enc_key {
            None => {
                let raw = fs::read(self.sv_path(device_id))?;
                Vault::from_bytes(&raw)
            }
            Some(key) => {
                let sealed = fs::read(self.dv_path(device_id))?;
                let raw = open_storage(key.as_bytes(), &sealed)?;
                Vault::from_bytes(&raw)
            }
        }
    }

    /// Persist a vault. `enc_key` selects the role the same way `load`
    /// does. Writes are atomic: temp file in the same directory, then
    /// rename over the target.
    pub fn store(
        &self,
        vault: &Vault,
        device_id: u32,
        enc_key: Option<&VaultEncKey>,
    ) -> Result<(), AuthError> {
        let (path, bytes) = match enc_key {
            None => (self.sv_path(device_id), vault.to_bytes()),
            Some(key) => {
                let plain = vault.to_bytes();
                (self.dv_path(device_id), crypto::seal(key.as_bytes(), &plain))
            }
        };
        write_atomic(&path, &bytes)?;
        Ok(())
    }

    /// Write a freshly generated vault-encryption key to disk (used only
    /// by provisioning).
    pub fn store_vault_enc_key(&self, device_id: u32, key: &VaultEncKey) -> Result<(), AuthError> {
        write_atomic(&self.dv_key_path(device_id), key.as_bytes())?;
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_like::TempDir;

    /// Minimal scoped temp-dir helper so this crate doesn't need a
    /// dev-dependency on `tempfile` just for three tests.
    mod tempfile_like {
        use std::path::PathBuf;

        pub struct TempDir(PathBuf);

        impl TempDir {
            pub fn new(label: &str) -> Self {
                let mut path = std::env::temp_dir();
                let unique = format!(
                    "vaultkeep-test-{label}-{}-{}",
                    std::process::id(),
                    super::super::crypto::random_bytes(8).iter().map(|b| format!("{b:02x}")).collect::<String>()
                );
                path.push(unique);
                std::fs::create_dir_all(&path).unwrap();
                Self(path)
            }

            pub fn path(&self) -> &std::path::Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    fn sample_vault(n: usize) -> Vault {
        let keys = (0..n).map(|_| crypto::generate_key()).collect();
        Vault::from_keys(keys)
    }

    #[test]
    fn collector_round_trip_is_raw() {
        let dir = TempDir::new("collector-roundtrip");
        let store = VaultStore::new(dir.path());
        let vault = sample_vault(128);

        store.store(&vault, 1058, None).unwrap();
        let loaded = store.load(1058, None).unwrap();
        assert_eq!(loaded, vault);
    }

    #[test]
    fn device_round_trip_is_encrypted_at_rest() {
        let dir = TempDir::new("device-roundtrip");
        let store = VaultStore::new(dir.path());
        let vault = sample_vault(128);
        let enc_key = VaultEncKey::generate();

        store.store(&vault, 1058, Some(&enc_key)).unwrap();

        let raw_on_disk = fs::read(dir.path().join(PATH_DV_VAULTS).join("1058")).unwrap();
        assert_ne!(raw_on_disk, vault.to_bytes(), "vault must not be stored in the clear");

        let loaded = store.load(1058, Some(&enc_key)).unwrap();
        assert_eq!(loaded, vault);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let dir = TempDir::new("wrong-key");
        let store = VaultStore::new(dir.path());
        let vault = sample_vault(4);
        let enc_key = VaultEncKey::generate();
        store.store(&vault, 42, Some(&enc_key)).unwrap();

        let wrong_key = VaultEncKey::generate();
        assert!(store.load(42, Some(&wrong_key)).is_err());
    }

    #[test]
    fn truncated_vault_is_corrupt() {
        let bytes = vec![0u8; KEY_LEN + 1];
        assert!(Vault::from_bytes(&bytes).is_err());
    }

    #[test]
    fn empty_vault_is_corrupt() {
        assert!(Vault::from_bytes(&[]).is_err());
    }

    #[test]
    fn xor_rotate_touches_every_key() {
        let mut vault = sample_vault(8);
        let original = vault.clone();
        let tag = [0xAAu8; 32];
        vault.xor_rotate(&tag);
        for i in 0..8 {
            assert_eq!(*vault.get(i), crypto::xor(original.get(i), &tag)[..]);
        }
    }
}
