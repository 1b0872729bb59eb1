//! Pending entries — sends awaiting their matching receive.

use crate::account::Account;
use crate::amount::Amount;
use crate::epoch::Epoch;
use crate::hash::BlockHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of the pending table: the receiving account and the send block hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingKey {
    pub receiving_account: Account,
    pub send_hash: BlockHash,
}

impl PendingKey {
    pub fn new(receiving_account: Account, send_hash: BlockHash) -> Self {
        Self {
            receiving_account,
            send_hash,
        }
    }

    /// Fixed-width 64-byte key: account then hash. Sorting groups an
    /// account's receivables together, which the bulk-pull-account server
    /// relies on.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.receiving_account.as_bytes());
        out[32..].copy_from_slice(self.send_hash.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        let mut account = [0u8; 32];
        let mut hash = [0u8; 32];
        account.copy_from_slice(&bytes[..32]);
        hash.copy_from_slice(&bytes[32..]);
        Self {
            receiving_account: Account::new(account),
            send_hash: BlockHash::new(hash),
        }
    }
}

impl fmt::Debug for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PendingKey({:?}, {:?})",
            self.receiving_account, self.send_hash
        )
    }
}

/// Value of the pending table: who sent, how much, and under which epoch the
/// send was made (receives inherit the work rules of the source epoch).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    pub source: Account,
    pub amount: Amount,
    pub epoch: Epoch,
}

impl PendingInfo {
    pub fn new(source: Account, amount: Amount, epoch: Epoch) -> Self {
        Self {
            source,
            amount,
            epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_byte_round_trip() {
        let key = PendingKey::new(Account::new([0x01; 32]), BlockHash::new([0x02; 32]));
        assert_eq!(PendingKey::from_bytes(&key.to_bytes()), key);
    }

    #[test]
    fn keys_sort_by_account_first() {
        let a = PendingKey::new(Account::new([0x01; 32]), BlockHash::new([0xFF; 32]));
        let b = PendingKey::new(Account::new([0x02; 32]), BlockHash::new([0x00; 32]));
        assert!(a < b);
        assert!(a.to_bytes() < b.to_bytes());
    }
}
