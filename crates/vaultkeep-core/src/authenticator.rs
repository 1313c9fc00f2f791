//! The per-session authenticator: the state machine that composes and
//! validates the handshake, establishes the session key, and encrypts,
//! decrypts and rotates everything that follows.

use tracing::{debug, trace};

use crate::challenge::Challenge;
use crate::constants::KEY_LEN;
use crate::crypto::{self, xor};
use crate::error::AuthError;
use crate::vault::{Vault, VaultEncKey, VaultStore};
use crate::wire::{Message, MessageType};

/// Which side of the protocol an [`Authenticator`] plays.
///
/// The device holds the key that decrypts its own vault file at rest; the
/// collector's vault is stored raw. The role also fixes what peer id is
/// expected in a handshake frame — see [`Authenticator::check_device_id`].
#[derive(Debug, Clone)]
pub enum Role {
    Device { vault_enc_key: VaultEncKey },
    Collector,
}

/// Per-connection mutable state owned by one [`Authenticator`].
#[derive(Debug)]
struct Session {
    session_id: u32,
    session_key: [u8; KEY_LEN],
    exchanged: Vec<Vec<u8>>,
}

impl Session {
    fn fresh(session_id: u32) -> Self {
        Self { session_id, session_key: [0u8; KEY_LEN], exchanged: Vec::new() }
    }
}

/// Owns `{device_id, role, vault, session}` for exactly one connection.
///
/// Created once per device identity per connection; [`Authenticator::reset`]
/// advances its session fields in place and rewrites the vault on disk.
#[derive(Debug)]
pub struct Authenticator {
    device_id: u32,
    role: Role,
    vault: Vault,
    store: VaultStore,
    session: Session,
}

impl Authenticator {
    /// Load the vault for `device_id` under `role` from `store` and start
    /// a fresh session at `session_id` (0 for a brand-new Authenticator).
    pub fn new(
        device_id: u32,
        role: Role,
        store: VaultStore,
        session_id: u32,
    ) -> Result<Self, AuthError> {
        let vault = match &role {
            Role::Device { vault_enc_key } => store.load(device_id, Some(vault_enc_key))?,
            Role::Collector => store.load(device_id, None)?,
        };
        Ok(Self { device_id, role, vault, store, session: Session::fresh(session_id) })
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn session_id(&self) -> u32 {
        self.session.session_id
    }

    fn enc_key(&self) -> Option<&VaultEncKey> {
        match &self.role {
            Role::Device { vault_enc_key } => Some(vault_enc_key),
            Role::Collector => None,
        }
    }

    /// Draw a challenge against the current vault and solve it.
    ///
    /// If `fold_session_key`, this also folds our own session-key
    /// contribution into `session.session_key` — locally, before it is
    /// ever advertised to the peer — and XORs that same contribution
    /// into the returned solution. This is the resolution of the
    /// session-key asymmetry: both peers call this once per handshake
    /// and fold their own half in here, then receive the peer's half via
    /// [`Authenticator::feed_key`].
    pub fn generate_challenge(
        &mut self,
        fold_session_key: bool,
        forbidden: Option<&[u32]>,
    ) -> ([u8; KEY_LEN], Challenge) {
        let challenge = Challenge::new(self.vault.len(), forbidden);
        let mut solution = challenge.solve(&self.vault);

        if fold_session_key {
            let own_half = crypto::generate_key();
            crypto::xor_in_place(&mut self.session.session_key, &own_half);
            solution = xor(&solution, &own_half).try_into().unwrap();
        }

        (solution, challenge)
    }

    /// Solve `challenge` against the current vault, optionally XORing in
    /// `xor_mask` (the peer's session-key contribution) on top.
    pub fn solve_challenge(&self, challenge: &Challenge, xor_mask: Option<&[u8; KEY_LEN]>) -> [u8; KEY_LEN] {
        let solution = challenge.solve(&self.vault);
        match xor_mask {
            Some(mask) => xor(&solution, mask).try_into().unwrap(),
            None => solution,
        }
    }

    /// Build a handshake (`0x30`) message.
    ///
    /// Concatenates, in order: `answer` (if any), the session key (if
    /// `fold_session_key` — the own-half contribution already folded into
    /// `session.session_key` by a prior [`Authenticator::generate_challenge`]
    /// call), and `challenge.to_bytes()` (if any). If `enc_key` is given
    /// the whole concatenation is AEAD-sealed under it instead of sent in
    /// the clear.
    pub fn handshake(
        &self,
        fold_session_key: bool,
        enc_key: Option<&[u8; KEY_LEN]>,
        answer: Option<&[u8]>,
        challenge: Option<&Challenge>,
    ) -> Message {
        let mut data = Vec::new();
        if let Some(answer) = answer {
            data.extend_from_slice(answer);
        }
        if fold_session_key {
            data.extend_from_slice(&self.session.session_key);
        }
        if let Some(challenge) = challenge {
            data.extend_from_slice(&challenge.to_bytes());
        }

        let payload = match enc_key {
            Some(key) => crypto::seal(key, &data),
            None => data,
        };

        // The device stamps its real id on M1/M3; the collector stamps 0 on
        // M2/M4, matching what `check_device_id` expects of the other side.
        let device_id = match &self.role {
            Role::Device { .. } => self.device_id,
            Role::Collector => 0,
        };

        Message::new(device_id, self.session.session_id, MessageType::Handshake, payload)
    }

    /// Validate that `msg` is a handshake frame addressed to us in the
    /// current session.
    pub fn check_handshake(&self, msg: &Message) -> bool {
        msg.msg_type == MessageType::Handshake
            && self.check_device_id(msg.device_id)
            && self.check_session_id(msg.session_id)
    }

    /// Fold the peer's session-key contribution into ours. Called exactly
    /// once per side per handshake, after the peer's half has been
    /// decrypted out of its message. Combined with the own-half fold-in
    /// in [`Authenticator::generate_challenge`], both sides converge on
    /// `own_half XOR peer_half`.
    pub fn feed_key(&mut self, peer_contribution: &[u8; KEY_LEN]) {
        crypto::xor_in_place(&mut self.session.session_key, peer_contribution);
    }

    /// Seal `plaintext` under the session key as a record (`0x31`) message.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Message {
        self.session.exchanged.push(plaintext.to_vec());
        let sealed = crypto::seal(&self.session.session_key, plaintext);
        Message::new(self.device_id, self.session.session_id, MessageType::Record, sealed)
    }

    /// Open a record (`0x31`) message addressed to us in the current
    /// session and return its plaintext.
    pub fn decrypt(&mut self, msg: &Message) -> Result<Vec<u8>, AuthError> {
        if msg.msg_type != MessageType::Record
            || !self.check_device_id(msg.device_id)
            || !self.check_session_id(msg.session_id)
        {
            return Err(AuthError::InvalidFrame(format!(
                "record frame mismatch: device_id={}, session_id={}, type={:?}",
                msg.device_id, msg.session_id, msg.msg_type
            )));
        }

        let plaintext = crypto::open(&self.session.session_key, &msg.payload)?;
        self.session.exchanged.push(plaintext.clone());
        Ok(plaintext)
    }

    /// Count of application payloads observed this session, sent and
    /// received combined.
    pub fn time_lived(&self) -> usize {
        self.session.exchanged.len()
    }

    /// Rotate the vault and roll the session.
    ///
    /// 1. Build a 32-byte rotation key from the session's exchanged
    ///    plaintexts, doubling the transcript until it reaches 32 bytes
    ///    (an empty transcript is treated as a single zero byte first).
    /// 2. Tag the concatenated current vault with
    ///    `HMAC-SHA256(rotation_key, vault_bytes)`.
    /// 3. XOR every vault entry with that same tag (bug-compatible with
    ///    the reference this protocol was distilled from — every entry
    ///    gets the identical tag, not a per-index derivation).
    /// 4. Persist the rotated vault, advance `session_id`, zero the
    ///    session key, and clear the exchanged log.
    pub fn reset(&mut self) -> Result<(), AuthError> {
        let mut stream: Vec<u8> = self.session.exchanged.iter().flatten().copied().collect();
        if stream.is_empty() {
            stream.push(0);
        }
        while stream.len() < KEY_LEN {
            let original = stream.clone();
            stream.extend_from_slice(&original);
        }
        let mut rotation_key = [0u8; KEY_LEN];
        rotation_key.copy_from_slice(&stream[..KEY_LEN]);

        let vault_bytes = self.vault.to_bytes();
        let tag = crypto::hmac_sha256(&rotation_key, &vault_bytes);
        self.vault.xor_rotate(&tag);

        self.store.store(&self.vault, self.device_id, self.enc_key())?;

        self.session.session_id += 1;
        self.session.session_key = [0u8; KEY_LEN];
        self.session.exchanged.clear();

        debug!(device_id = self.device_id, new_session_id = self.session.session_id, "vault rotated");
        Ok(())
    }

    pub fn check_device_id(&self, device_id: u32) -> bool {
        match &self.role {
            Role::Collector => device_id == self.device_id,
            Role::Device { .. } => device_id == 0,
        }
    }

    pub fn check_session_id(&self, session_id: u32) -> bool {
        session_id == self.session.session_id
    }

    /// Number of keys currently in the vault. Exposed so handshake role
    /// programs can size challenge restrictions without reaching past
    /// this module.
    pub fn vault_len(&self) -> usize {
        self.vault.len()
    }
}

impl Drop for Authenticator {
    fn drop(&mut self) {
        trace!(device_id = self.device_id, "authenticator dropped");
    }
}
