//! Ledger constants: genesis, epochs, and work thresholds per network.

use crate::block::{Block, OpenBlock};
use crate::epochs::Epochs;
use strand_crypto::{keypair_from_seed, sign_message};
use strand_types::{Account, Amount, BlockHash, Epoch, KeyPair, Link};
use strand_work::WorkThresholds;

/// Fixed parameters of one network instance.
pub struct LedgerConstants {
    pub work: WorkThresholds,
    pub genesis_block: Block,
    pub genesis_account: Account,
    pub genesis_amount: Amount,
    pub epochs: Epochs,
}

/// Seed of the well-known development key. Dev networks and unit tests sign
/// with it; it must never hold value on a real network.
const DEV_GENESIS_SEED: [u8; 32] = [0x17; 32];

/// The development genesis key pair.
pub fn dev_genesis_key() -> KeyPair {
    keypair_from_seed(&DEV_GENESIS_SEED)
}

fn epoch_marker(tag: &[u8]) -> Link {
    let mut bytes = [0u8; 32];
    bytes[..tag.len()].copy_from_slice(tag);
    Link::new(bytes)
}

impl LedgerConstants {
    /// Development network: zero work thresholds, seed-derived genesis key
    /// holding the full supply, epochs signed by the genesis key.
    pub fn dev() -> Self {
        Self::with_genesis_key(WorkThresholds::dev(), dev_genesis_key())
    }

    pub fn with_genesis_key(work: WorkThresholds, genesis_key: KeyPair) -> Self {
        let genesis_account = Account::from(genesis_key.public);
        let genesis_amount = Amount::MAX;

        let mut genesis = Block::Open(OpenBlock {
            // The genesis open receives from itself; the marker is the
            // account's own key reinterpreted as a hash.
            source: BlockHash::new(*genesis_account.as_bytes()),
            representative: genesis_account,
            account: genesis_account,
            signature: strand_types::Signature::ZERO,
            work: 0,
        });
        let hash = genesis.hash();
        genesis.set_signature(sign_message(hash.as_bytes(), &genesis_key.private));

        let mut epochs = Epochs::new();
        epochs.add(Epoch::Epoch1, epoch_marker(b"epoch v1 block"), genesis_account);
        epochs.add(Epoch::Epoch2, epoch_marker(b"epoch v2 block"), genesis_account);

        Self {
            work,
            genesis_block: genesis,
            genesis_account,
            genesis_amount,
            epochs,
        }
    }
}
