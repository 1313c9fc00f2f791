//! Compile-time constants shared by every peer role.
//!
//! These mirror the reference implementation's module-level constants.
//! None of them are runtime-configurable — changing them changes the wire
//! format and the vault layout, so they are baked into the binary.

/// Length in bytes of a single vault key, and of the session key and
/// vault-encryption key derived alongside it.
pub const KEY_LEN: usize = 32;

/// Number of keys in a freshly provisioned vault.
pub const VAULT_SIZE: usize = 128;

/// Number of application records exchanged in a session before the device
/// must re-authenticate and roll the vault.
pub const TIME_TO_LIVE: usize = 9;

/// Length in bytes of a challenge nonce.
pub const CHALLENGE_SIZE: usize = 12;

/// Length in bytes of an AEAD nonce (AES-256-GCM, 96-bit).
pub const AEAD_NONCE_LEN: usize = 12;

/// Length in bytes of the AEAD authentication tag appended to ciphertext.
pub const AEAD_TAG_LEN: usize = 16;

/// Default cap on a single frame's payload length. Frames claiming a
/// larger `length` are rejected as malformed before any allocation.
pub const MAX_FRAME_PAYLOAD: u32 = 64 * 1024;

/// Directory (relative to a configurable base) holding collector-side
/// raw vault files, one per device id.
pub const PATH_SV_VAULTS: &str = "svVaults";

/// Directory (relative to a configurable base) holding device-side
/// AEAD-sealed vault files, one per device id.
pub const PATH_DV_VAULTS: &str = "dvVaults";

/// Directory (relative to a configurable base) holding device-side raw
/// vault-encryption keys, one per device id.
pub const PATH_DV_KEYS: &str = "dvKeys";
