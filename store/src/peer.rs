//! Peer table — last-seen network endpoints, persisted across restarts.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use strand_types::Timestamp;

/// A remembered peer endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub address: SocketAddr,
    pub last_seen: Timestamp,
}

#[derive(Clone, Copy)]
pub struct PeerStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl PeerStore {
    pub fn put(&self, txn: &mut WriteTransaction, peer: &PeerEntry) -> Result<(), StoreError> {
        let key = peer.address.to_string();
        let value =
            bincode::serialize(peer).map_err(|e| StoreError::corrupted("peers", e))?;
        self.db.put(txn.raw_mut(), key.as_bytes(), &value)?;
        Ok(())
    }

    pub fn del(
        &self,
        txn: &mut WriteTransaction,
        address: &SocketAddr,
    ) -> Result<(), StoreError> {
        self.db
            .delete(txn.raw_mut(), address.to_string().as_bytes())?;
        Ok(())
    }

    pub fn iter_all(&self, txn: &dyn Transaction) -> Result<Vec<PeerEntry>, StoreError> {
        let mut out = Vec::new();
        for result in self.db.iter(txn.raw())? {
            let (_, value) = result?;
            let entry: PeerEntry =
                bincode::deserialize(value).map_err(|e| StoreError::corrupted("peers", e))?;
            out.push(entry);
        }
        Ok(out)
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }
}
