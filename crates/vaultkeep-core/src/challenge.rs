//! Challenge construction, solving and verification — the mechanism that
//! lets a peer prove vault possession without ever sending a vault key.

use rand::Rng;
use subtle::ConstantTimeEq;

use crate::constants::CHALLENGE_SIZE;
use crate::crypto::{self, xor};
use crate::error::AuthError;

/// A `(nonce, subset)` pair drawn against a vault of known size.
///
/// The subset is a sequence of vault indices (duplicates allowed, order
/// significant) whose XOR-fold is the challenge's solution. The nonce is
/// unrelated to the subset; it is the value [`Challenge::verify`] checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    nonce: [u8; CHALLENGE_SIZE],
    subset: Vec<u32>,
}

impl Challenge {
    /// Draw a fresh challenge against a vault of `n_keys` entries.
    ///
    /// `set_size` is drawn uniformly from `[1, n_keys]`, then `set_size`
    /// indices are drawn uniformly and independently from `[0, n_keys)`.
    /// If `forbidden` is provided and the drawn subset equals it exactly,
    /// the draw is retried once.
    pub fn new(n_keys: usize, forbidden: Option<&[u32]>) -> Self {
        assert!(n_keys > 0, "a challenge needs a non-empty vault to draw against");
        loop {
            let mut rng = rand::thread_rng();
            let set_size = rng.gen_range(1..=n_keys);
            let subset: Vec<u32> =
                (0..set_size).map(|_| rng.gen_range(0..n_keys) as u32).collect();

            if forbidden.is_some_and(|f| f == subset.as_slice()) {
                continue;
            }

            let mut nonce = [0u8; CHALLENGE_SIZE];
            nonce.copy_from_slice(&crypto::random_bytes(CHALLENGE_SIZE));
            return Self { nonce, subset };
        }
    }

    pub fn nonce(&self) -> &[u8; CHALLENGE_SIZE] {
        &self.nonce
    }

    pub fn subset(&self) -> &[u32] {
        &self.subset
    }

    /// XOR-fold `vault[subset[0]]` with `vault[subset[1..]]`, in order.
    pub fn solve(&self, vault: &crate::vault::Vault) -> [u8; 32] {
        let mut acc = *vault.get(self.subset[0] as usize);
        for &index in &self.subset[1..] {
            let folded = xor(&acc, vault.get(index as usize));
            acc.copy_from_slice(&folded);
        }
        acc
    }

    /// Constant-time check that `candidate` is this challenge's nonce.
    pub fn verify(&self, candidate: &[u8]) -> bool {
        candidate.len() == CHALLENGE_SIZE && bool::from(self.nonce.ct_eq(candidate))
    }

    /// Wire format: `nonce(12) ‖ len(4, LE u32) ‖ idx[0](4, LE) … idx[len-1](4, LE)`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHALLENGE_SIZE + 4 + self.subset.len() * 4);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&(self.subset.len() as u32).to_le_bytes());
        for &index in &self.subset {
            out.extend_from_slice(&index.to_le_bytes());
        }
        out
    }

    /// Reverse [`Challenge::to_bytes`].
    ///
    /// Fails with `MalformedChallenge` if `data` is shorter than
    /// `12 + 4 + 4 * len`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, AuthError> {
        if data.len() < CHALLENGE_SIZE + 4 {
            return Err(AuthError::MalformedChallenge(format!(
                "challenge buffer is {} bytes, need at least {}",
                data.len(),
                CHALLENGE_SIZE + 4
            )));
        }
        let mut nonce = [0u8; CHALLENGE_SIZE];
        nonce.copy_from_slice(&data[..CHALLENGE_SIZE]);

        let len_bytes: [u8; 4] = data[CHALLENGE_SIZE..CHALLENGE_SIZE + 4].try_into().unwrap();
        let len = u32::from_le_bytes(len_bytes) as usize;

        let needed = CHALLENGE_SIZE + 4 + len * 4;
        if data.len() < needed {
            return Err(AuthError::MalformedChallenge(format!(
                "challenge declares {len} indices but buffer is only {} bytes, need {needed}",
                data.len()
            )));
        }

        let mut subset = Vec::with_capacity(len);
        let mut offset = CHALLENGE_SIZE + 4;
        for _ in 0..len {
            let idx_bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
            subset.push(u32::from_le_bytes(idx_bytes));
            offset += 4;
        }

        Ok(Self { nonce, subset })
    }
}
