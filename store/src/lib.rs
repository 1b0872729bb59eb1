//! LMDB-backed transactional tables for the strand ledger.
//!
//! One environment, one named database per table. A write transaction
//! serializes with all other writers; readers see the pre-write snapshot.
//! Keys are fixed-width big-endian byte strings (32-byte accounts and
//! hashes, 64-byte compound keys), so LMDB's key order is the domain order.

pub mod account;
pub mod block;
pub mod confirmation_height;
pub mod error;
pub mod final_vote;
pub mod frontier;
pub mod online_weight;
pub mod peer;
pub mod pending;
pub mod pruned;
pub mod rep_weight;
pub mod transaction;
pub mod unchecked;
pub mod version;
pub mod vote;

pub use account::{AccountInfo, AccountStore};
pub use block::BlockStore;
pub use confirmation_height::{ConfirmationHeightInfo, ConfirmationHeightStore};
pub use error::StoreError;
pub use final_vote::FinalVoteStore;
pub use frontier::FrontierStore;
pub use online_weight::OnlineWeightStore;
pub use peer::{PeerEntry, PeerStore};
pub use pending::PendingStore;
pub use pruned::PrunedStore;
pub use rep_weight::RepWeightStore;
pub use transaction::{ReadTransaction, Transaction, WriteTransaction};
pub use unchecked::{UncheckedStore, UncheckedValue};
pub use version::{VersionStore, SCHEMA_VERSION};
pub use vote::VoteStore;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use std::path::Path;
use std::sync::Arc;

const MAX_DBS: u32 = 16;

/// Environment tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct StoreOptions {
    /// Maximum database size in bytes (virtual mapping, grown lazily).
    pub map_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            map_size: 8 * 1024 * 1024 * 1024,
        }
    }
}

impl StoreOptions {
    /// Small mapping for unit tests.
    pub fn dev() -> Self {
        Self {
            map_size: 64 * 1024 * 1024,
        }
    }
}

/// The durable store: every table of the node under one LMDB environment.
pub struct Store {
    env: Arc<Env>,
    pub account: AccountStore,
    pub block: BlockStore,
    pub pending: PendingStore,
    pub frontier: FrontierStore,
    pub confirmation_height: ConfirmationHeightStore,
    pub pruned: PrunedStore,
    pub representation: RepWeightStore,
    pub online_weight: OnlineWeightStore,
    pub unchecked: UncheckedStore,
    pub peer: PeerStore,
    pub vote: VoteStore,
    pub final_vote: FinalVoteStore,
    pub version: VersionStore,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self, StoreError> {
        // Contract with heed: one environment per path per process; the node
        // opens its data directory exactly once at startup.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(options.map_size)
                .max_dbs(MAX_DBS)
                .open(path)
        }?;
        let env = Arc::new(env);

        let mut wtxn = env.write_txn()?;
        let account = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("accounts"))?;
        let block = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("blocks"))?;
        let pending = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("pending"))?;
        let frontier = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("frontiers"))?;
        let confirmation_height =
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some("confirmation_height"))?;
        let pruned = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("pruned"))?;
        let representation =
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some("representation"))?;
        let online_weight =
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some("online_weight"))?;
        let unchecked = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("unchecked"))?;
        let peer = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("peers"))?;
        let vote = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("vote"))?;
        let final_vote = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("final_vote"))?;
        let version = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("version"))?;
        wtxn.commit()?;

        let store = Self {
            env,
            account: AccountStore { db: account },
            block: BlockStore { db: block },
            pending: PendingStore { db: pending },
            frontier: FrontierStore { db: frontier },
            confirmation_height: ConfirmationHeightStore {
                db: confirmation_height,
            },
            pruned: PrunedStore { db: pruned },
            representation: RepWeightStore { db: representation },
            online_weight: OnlineWeightStore { db: online_weight },
            unchecked: UncheckedStore { db: unchecked },
            peer: PeerStore { db: peer },
            vote: VoteStore { db: vote },
            final_vote: FinalVoteStore { db: final_vote },
            version: VersionStore { db: version },
        };
        store.check_version()?;
        Ok(store)
    }

    /// Verify the schema version, stamping a fresh database. A mismatch is
    /// fatal: the caller must not run against an unknown layout.
    fn check_version(&self) -> Result<(), StoreError> {
        let mut txn = self.tx_begin_write()?;
        match self.version.get(&txn)? {
            Some(found) if found != SCHEMA_VERSION => {
                txn.abort();
                Err(StoreError::VersionMismatch {
                    found,
                    expected: SCHEMA_VERSION,
                })
            }
            Some(_) => {
                txn.abort();
                Ok(())
            }
            None => {
                self.version.put(&mut txn, SCHEMA_VERSION)?;
                txn.commit()
            }
        }
    }

    pub fn tx_begin_read(&self) -> Result<ReadTransaction<'_>, StoreError> {
        let txn = self.env.read_txn()?;
        Ok(ReadTransaction { txn })
    }

    pub fn tx_begin_write(&self) -> Result<WriteTransaction<'_>, StoreError> {
        let txn = self.env.write_txn()?;
        Ok(WriteTransaction { txn })
    }
}
