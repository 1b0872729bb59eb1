//! Signed votes.
//!
//! A vote covers up to [`MAX_VOTE_HASHES`] block hashes under one signature.
//! The timestamp doubles as a per-representative sequence number; the
//! reserved maximum value marks a *final* vote, an immutable commitment.

use crate::error::VoteError;
use serde::{Deserialize, Serialize};
use strand_crypto::{blake2b_256_multi, sign_message, verify_signature};
use strand_types::{Account, BlockHash, KeyPair, Signature};

/// Signature cost is amortized over a batch of hashes, capped so one vote
/// stays within a network frame.
pub const MAX_VOTE_HASHES: usize = 12;

/// Timestamp value reserved for final votes.
pub const FINAL_TIMESTAMP: u64 = u64::MAX;

/// Domain separator mixed into the vote digest so a vote can never collide
/// with a block hash preimage.
const VOTE_PREFIX: &[u8] = b"vote ";

/// A representative's signed statement about a set of blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// The representative casting the vote.
    pub voting_account: Account,
    /// Monotonic per-representative counter; `FINAL_TIMESTAMP` = final.
    pub timestamp: u64,
    /// The block hashes voted for.
    pub hashes: Vec<BlockHash>,
    pub signature: Signature,
}

impl Vote {
    /// Build and sign a vote. Oversized hash lists are signable but fail
    /// [`Vote::validate`]; the cap is enforced at the validation boundary.
    pub fn new(key: &KeyPair, timestamp: u64, hashes: Vec<BlockHash>) -> Self {
        let mut vote = Self {
            voting_account: Account::from(key.public),
            timestamp,
            hashes,
            signature: Signature::ZERO,
        };
        let digest = vote.digest();
        vote.signature = sign_message(&digest, &key.private);
        vote
    }

    pub fn new_final(key: &KeyPair, hashes: Vec<BlockHash>) -> Self {
        Self::new(key, FINAL_TIMESTAMP, hashes)
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == FINAL_TIMESTAMP
    }

    /// The signed digest: prefix ‖ hashes ‖ timestamp.
    pub fn digest(&self) -> [u8; 32] {
        let timestamp = self.timestamp.to_le_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(self.hashes.len() + 2);
        parts.push(VOTE_PREFIX);
        for hash in &self.hashes {
            parts.push(hash.as_bytes());
        }
        parts.push(&timestamp);
        blake2b_256_multi(&parts)
    }

    /// Structural and cryptographic validation. Weight-dependent checks
    /// (zero-weight reps) belong to the vote processor.
    pub fn validate(&self) -> Result<(), VoteError> {
        if self.hashes.is_empty() || self.hashes.len() > MAX_VOTE_HASHES {
            return Err(VoteError::Indeterminate);
        }
        let digest = self.digest();
        if !verify_signature(&digest, &self.signature, &self.voting_account.public_key()) {
            return Err(VoteError::BadSignature);
        }
        Ok(())
    }
}
