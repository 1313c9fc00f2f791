//! vaultkeep-provision — the one-time, offline tool that seeds a new
//! device's vault.
//!
//! Picks (or accepts) a device id, generates a fresh vault of
//! `VAULT_SIZE` random `KEY_LEN`-byte keys and a fresh vault-encryption
//! key, and writes the three files of the file layout: the raw vault for
//! the collector, the AEAD-sealed vault for the device, and the raw
//! vault-encryption key for the device. Run once per device, before its
//! first connection to the collector.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::Rng;

use vaultkeep_core::constants::VAULT_SIZE;
use vaultkeep_core::crypto;
use vaultkeep_core::vault::{Vault, VaultEncKey, VaultStore};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse(std::env::args().skip(1))?;

    let device_id = args.device_id.unwrap_or_else(|| rand::thread_rng().gen_range(1..=10_000));
    let store = VaultStore::new(args.base_dir.clone());

    let vault = Vault::from_keys((0..VAULT_SIZE).map(|_| crypto::generate_key()).collect());
    let vault_enc_key = VaultEncKey::generate();

    store.store(&vault, device_id, None).context("writing collector-side raw vault")?;
    store.store_vault_enc_key(device_id, &vault_enc_key).context("writing device vault-encryption key")?;
    store.store(&vault, device_id, Some(&vault_enc_key)).context("writing device-side sealed vault")?;

    tracing::info!(device_id, base_dir = %args.base_dir.display(), "provisioned new device");
    println!("Provisioned device {device_id} under {}", args.base_dir.display());

    Ok(())
}

struct Args {
    device_id: Option<u32>,
    base_dir: PathBuf,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut device_id = None;
        let mut base_dir = PathBuf::from(".");

        let mut args = args.peekable();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--device-id" => {
                    let value = args.next().context("--device-id requires a value")?;
                    device_id = Some(value.parse().context("--device-id must be a non-negative integer")?);
                }
                "--base-dir" => {
                    let value = args.next().context("--base-dir requires a value")?;
                    base_dir = PathBuf::from(value);
                }
                other => anyhow::bail!("unrecognized argument: {other}"),
            }
        }

        Ok(Self { device_id, base_dir })
    }
}
