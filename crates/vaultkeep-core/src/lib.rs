//! vaultkeep-core — vault storage, the challenge-response handshake, the
//! per-session authenticator, and the wire framing that carries both.
//!
//! All other vaultkeep crates depend on this one. Nothing here touches a
//! socket directly except the byte-stream framing in [`wire`], which is
//! generic over any `AsyncRead`/`AsyncWrite`.

pub mod authenticator;
pub mod challenge;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod telemetry;
pub mod vault;
pub mod wire;

pub use authenticator::{Authenticator, Role};
pub use challenge::Challenge;
pub use constants::{CHALLENGE_SIZE, KEY_LEN, TIME_TO_LIVE, VAULT_SIZE};
pub use error::AuthError;
pub use handshake::{collector_respond, device_initiate, HANDSHAKE_TIMEOUT};
pub use telemetry::{Telemetry, TelemetryCodecError};
pub use vault::{Vault, VaultEncKey, VaultStore};
pub use wire::{Message, MessageType};
