//! Error kinds for the authentication core.
//!
//! Every variant maps 1:1 to one of the named failure modes in the
//! protocol design: what it means and who's fatal to is documented on the
//! variant, not scattered across call sites.

use thiserror::Error;

/// An error raised by vault storage, the challenge protocol, the
/// authenticator, or message framing.
///
/// None of these are recovered inside the core — a connection worker
/// catches one, logs it, and tears the connection down. See the crate's
/// top-level docs for the policy per kind.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The vault file's length is not a positive multiple of `KEY_LEN`,
    /// or authenticated decryption of the device-side vault failed.
    /// Fatal for the device — it requires re-provisioning.
    #[error("vault corrupt: {0}")]
    VaultCorrupt(String),

    /// A challenge's wire bytes did not parse (buffer too short for the
    /// declared subset length).
    #[error("malformed challenge: {0}")]
    MalformedChallenge(String),

    /// A frame's declared payload length exceeds the configured cap, or
    /// its header did not parse.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A frame's `device_id`, `session_id`, or `type` did not match what
    /// the receiving Authenticator expected.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Challenge-nonce verification or an AEAD tag check failed during
    /// the handshake. The device may retry by reconnecting.
    #[error("handshake failed: {0}")]
    HandshakeFail(String),

    /// An AEAD tag check failed on an application record.
    #[error("record authentication failed")]
    AuthFailed,

    /// The collector received M1 for a device that already has a live
    /// Authenticator on another connection.
    #[error("duplicate session for device {0}")]
    DuplicateSession(u32),

    /// The peer closed the connection, or a read/write timed out.
    #[error("transport closed")]
    TransportClosed,

    /// Reading or writing a vault/key file failed at the I/O layer.
    /// Device-fatal.
    #[error("storage error: {0}")]
    StorageError(#[from] std::io::Error),
}
