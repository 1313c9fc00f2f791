//! Cryptographic primitives for vaultkeep.
//!
//! Two things live here:
//!   1. AES-256-GCM AEAD — seals vault files at rest and every handshake
//!      and record payload. Nonce is always 12 random bytes, prepended to
//!      the ciphertext; there is no associated data anywhere in this
//!      protocol.
//!   2. HMAC-SHA256 — keys the vault rotation tag in [`crate::authenticator`].
//!
//! There is no asymmetric cryptography in this crate by design: the
//! protocol proves vault possession symmetrically, never a public key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::constants::{AEAD_NONCE_LEN, AEAD_TAG_LEN, KEY_LEN};
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Generate `len` cryptographically random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Generate a fresh `KEY_LEN`-byte key (vault key, session-key half,
/// vault-encryption key — all the same shape).
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Generate a fresh AEAD nonce.
pub fn generate_nonce() -> [u8; AEAD_NONCE_LEN] {
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Seal `plaintext` under `key` with a fresh random nonce.
///
/// Returns `nonce ‖ ciphertext‖tag` — the layout used everywhere in this
/// protocol (vault files on disk, handshake payloads, application
/// records).
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);
    // Encryption under a freshly random 96-bit nonce cannot fail.
    let sealed = cipher
        .encrypt(nonce, plaintext)
        .expect("AES-256-GCM encryption is infallible for valid keys");

    let mut out = Vec::with_capacity(AEAD_NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    out
}

/// Reverse [`seal`]: split the leading nonce off `data`, verify the tag,
/// and return the plaintext.
///
/// Fails with `AuthError::AuthFailed` if `data` is too short to contain a
/// nonce and a tag, or if the AEAD tag does not verify.
pub fn open(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>, AuthError> {
    if data.len() < AEAD_NONCE_LEN + AEAD_TAG_LEN {
        return Err(AuthError::AuthFailed);
    }
    let (nonce_bytes, sealed) = data.split_at(AEAD_NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, sealed)
        .map_err(|_| AuthError::AuthFailed)
}

/// Like [`open`], but the caller already knows `key` only by a name used
/// in handshake failure messages (a vault-encryption-key decrypt, not a
/// session record). Same semantics, distinct error variant.
pub fn open_storage(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>, AuthError> {
    open(key, data).map_err(|_| AuthError::VaultCorrupt("authenticated decryption failed".into()))
}

/// HMAC-SHA256(key, data), the tag used to derive the next vault from the
/// current one during rotation.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&tag);
    out
}

/// XOR two equal-length byte slices. Panics if the lengths differ — every
/// call site in this crate XORs fixed `KEY_LEN`-sized buffers.
pub fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    assert_eq!(a.len(), b.len(), "xor operands must have equal length");
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

/// XOR-fold `a` in place with `b`, byte by byte. Used for the 32-byte
/// fixed-size keys that dominate this protocol.
pub fn xor_in_place(a: &mut [u8; KEY_LEN], b: &[u8; KEY_LEN]) {
    for i in 0..KEY_LEN {
        a[i] ^= b[i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let key = generate_key();
        let plaintext = b"sensor payload";
        let sealed = seal(&key, plaintext);
        let opened = open(&key, &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = generate_key();
        let mut sealed = seal(&key, b"abc");
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(open(&key, &sealed).is_err());
    }

    #[test]
    fn hmac_is_deterministic() {
        let key = b"rotation key material....";
        let data = b"vault bytes";
        assert_eq!(hmac_sha256(key, data), hmac_sha256(key, data));
    }

    #[test]
    fn xor_self_inverse() {
        let a = generate_key();
        let b = generate_key();
        let c = xor(&a, &b);
        let back = xor(&c, &b);
        assert_eq!(back, a);
    }
}
