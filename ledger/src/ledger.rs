//! The ledger: a pure state machine over the store.
//!
//! All operations take a caller-held transaction. `process` and `rollback`
//! are the only mutators besides cementation and pruning; every one of them
//! keeps the rep-weight cache and the persisted `representation` table in
//! step within the same write transaction.

use crate::block::{Block, SavedBlock, Sideband};
use crate::error::LedgerError;
use crate::genesis::LedgerConstants;
use crate::rep_weights::RepWeights;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use strand_store::{
    AccountInfo, ConfirmationHeightInfo, Store, Transaction, WriteTransaction,
};
use strand_types::{
    Account, Amount, BlockHash, Epoch, Link, PendingInfo, PendingKey, Timestamp,
};

/// Table counters kept in memory so RPC and telemetry never scan.
#[derive(Default)]
pub struct LedgerCache {
    pub block_count: AtomicU64,
    pub account_count: AtomicU64,
    pub pruned_count: AtomicU64,
    pub cemented_count: AtomicU64,
}

pub struct Ledger {
    pub store: Arc<Store>,
    pub constants: LedgerConstants,
    pub rep_weights: RepWeights,
    pub cache: LedgerCache,
    pruning_enabled: AtomicBool,
}

impl Ledger {
    /// Open the ledger over a store, writing the genesis block on first run
    /// and rebuilding the in-memory caches.
    pub fn new(store: Arc<Store>, constants: LedgerConstants) -> Result<Self, LedgerError> {
        let ledger = Self {
            store,
            constants,
            rep_weights: RepWeights::new(),
            cache: LedgerCache::default(),
            pruning_enabled: AtomicBool::new(false),
        };

        let mut txn = ledger.store.tx_begin_write()?;
        if ledger.store.account.count(&txn)? == 0 {
            ledger.initialize_genesis(&mut txn)?;
        }
        txn.commit()?;

        let txn = ledger.store.tx_begin_read()?;
        ledger
            .rep_weights
            .rebuild(ledger.store.representation.iter_all(&txn)?.into_iter());
        ledger
            .cache
            .block_count
            .store(ledger.store.block.count(&txn)?, Ordering::Relaxed);
        ledger
            .cache
            .account_count
            .store(ledger.store.account.count(&txn)?, Ordering::Relaxed);
        ledger
            .cache
            .pruned_count
            .store(ledger.store.pruned.count(&txn)?, Ordering::Relaxed);
        let cemented = ledger
            .store
            .confirmation_height
            .iter_all(&txn)?
            .into_iter()
            .fold(0u64, |acc, (_, info)| acc.saturating_add(info.height));
        ledger.cache.cemented_count.store(cemented, Ordering::Relaxed);
        drop(txn);

        Ok(ledger)
    }

    fn initialize_genesis(&self, txn: &mut WriteTransaction) -> Result<(), LedgerError> {
        let genesis = &self.constants.genesis_block;
        let hash = genesis.hash();
        let account = self.constants.genesis_account;
        let amount = self.constants.genesis_amount;

        let sideband = Sideband {
            account,
            height: 1,
            successor: BlockHash::ZERO,
            balance: amount,
            timestamp: Timestamp::now(),
            details: crate::block::BlockDetails::new(Epoch::Epoch0, false, true, false),
            source_epoch: Epoch::Epoch0,
        };
        let saved = SavedBlock::new(genesis.clone(), sideband);
        self.store.block.put(txn, &hash, &saved.to_store_bytes())?;
        self.store.frontier.put(txn, &hash, &account)?;
        self.store.account.put(
            txn,
            &account,
            &AccountInfo {
                head: hash,
                open_block: hash,
                balance: amount,
                modified: Timestamp::now(),
                block_count: 1,
                representative: account,
                epoch: Epoch::Epoch0,
            },
        )?;
        // Genesis is born cemented.
        self.store.confirmation_height.put(
            txn,
            &account,
            &ConfirmationHeightInfo::new(1, hash),
        )?;
        self.store.representation.put(txn, &account, amount)?;
        tracing::info!(genesis = %hash, "initialized empty ledger");
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn block_get(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<SavedBlock>, LedgerError> {
        match self.store.block.get(txn, hash)? {
            Some(bytes) => {
                let saved = SavedBlock::from_store_bytes(&bytes)
                    .map_err(|e| LedgerError::Corrupted(format!("block {hash}: {e}")))?;
                Ok(Some(saved))
            }
            None => Ok(None),
        }
    }

    pub fn block_exists(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<bool, LedgerError> {
        Ok(self.store.block.exists(txn, hash)?)
    }

    pub fn block_or_pruned_exists(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<bool, LedgerError> {
        Ok(self.store.block.exists(txn, hash)? || self.store.pruned.exists(txn, hash)?)
    }

    pub fn account_info(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<Option<AccountInfo>, LedgerError> {
        Ok(self.store.account.get(txn, account)?)
    }

    /// Frontier hash of an account.
    pub fn latest(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<Option<BlockHash>, LedgerError> {
        Ok(self.account_info(txn, account)?.map(|info| info.head))
    }

    /// The account that owns a block.
    pub fn account_of(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<Account>, LedgerError> {
        Ok(self.block_get(txn, hash)?.map(|saved| saved.account()))
    }

    /// Balance after a block.
    pub fn balance(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<Amount>, LedgerError> {
        Ok(self.block_get(txn, hash)?.map(|saved| saved.balance()))
    }

    /// The signed delta a block applied: send amount, receive amount, or
    /// zero for change/epoch. `None` when the predecessor is pruned.
    pub fn amount(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<Amount>, LedgerError> {
        let Some(saved) = self.block_get(txn, hash)? else {
            return Ok(None);
        };
        let previous = saved.block.previous();
        if previous.is_zero() {
            return Ok(Some(saved.balance()));
        }
        let Some(prev_balance) = self.balance(txn, &previous)? else {
            return Ok(None);
        };
        let balance = saved.balance();
        let delta = if balance >= prev_balance {
            balance - prev_balance
        } else {
            prev_balance - balance
        };
        Ok(Some(delta))
    }

    /// Next block on the chain after `hash`, from the sideband.
    pub fn successor(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<BlockHash>, LedgerError> {
        Ok(self.block_get(txn, hash)?.and_then(|saved| saved.successor()))
    }

    /// Representative in effect at a block: the nearest representative field
    /// at or below it on the chain.
    pub fn representative_of(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<Account>, LedgerError> {
        let mut current = *hash;
        loop {
            let Some(saved) = self.block_get(txn, &current)? else {
                return Ok(None);
            };
            if let Some(rep) = saved.block.representative_field() {
                return Ok(Some(rep));
            }
            let previous = saved.block.previous();
            if previous.is_zero() {
                return Ok(None);
            }
            current = previous;
        }
    }

    pub fn weight(&self, representative: &Account) -> Amount {
        self.rep_weights.weight(representative)
    }

    pub fn pending_info(
        &self,
        txn: &dyn Transaction,
        key: &PendingKey,
    ) -> Result<Option<PendingInfo>, LedgerError> {
        Ok(self.store.pending.get(txn, key)?)
    }

    /// Pending entries of an account with amount ≥ `min_amount`.
    pub fn account_receivable(
        &self,
        txn: &dyn Transaction,
        account: &Account,
        min_amount: Amount,
        limit: usize,
    ) -> Result<Vec<(PendingKey, PendingInfo)>, LedgerError> {
        let entries = self.store.pending.iter_account(txn, account, usize::MAX)?;
        Ok(entries
            .into_iter()
            .filter(|(_, info)| info.amount >= min_amount)
            .take(limit)
            .collect())
    }

    /// Whether the block sits at or below its account's confirmation height.
    /// Pruned blocks were cemented by definition.
    pub fn block_confirmed(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<bool, LedgerError> {
        if self.store.pruned.exists(txn, hash)? {
            return Ok(true);
        }
        let Some(saved) = self.block_get(txn, hash)? else {
            return Ok(false);
        };
        let confirmed = self
            .store
            .confirmation_height
            .get(txn, &saved.account())?
            .map(|info| info.height)
            .unwrap_or(0);
        Ok(saved.height() <= confirmed)
    }

    pub fn is_epoch_link(&self, link: &Link) -> bool {
        self.constants.epochs.is_epoch_link(link)
    }

    pub fn epoch_link(&self, epoch: Epoch) -> Option<Link> {
        self.constants.epochs.link(epoch)
    }

    pub fn epoch_signer(&self, link: &Link) -> Option<Account> {
        self.constants.epochs.signer(link)
    }

    /// Find the block on `destination`'s chain that received `send_hash`.
    /// Walks from the frontier; used by rollback to undo dependent receives.
    pub fn find_receive_for_send(
        &self,
        txn: &dyn Transaction,
        destination: &Account,
        send_hash: &BlockHash,
    ) -> Result<Option<SavedBlock>, LedgerError> {
        let Some(info) = self.account_info(txn, destination)? else {
            return Ok(None);
        };
        let mut current = info.head;
        loop {
            let Some(saved) = self.block_get(txn, &current)? else {
                return Ok(None);
            };
            let receives_it = match &saved.block {
                Block::Open(b) => b.source == *send_hash,
                Block::Receive(b) => b.source == *send_hash,
                Block::State(b) => {
                    saved.sideband.details.is_receive && b.link.as_block_hash() == *send_hash
                }
                _ => false,
            };
            if receives_it {
                return Ok(Some(saved));
            }
            let previous = saved.block.previous();
            if previous.is_zero() {
                return Ok(None);
            }
            current = previous;
        }
    }

    // ── Cementation bookkeeping ─────────────────────────────────────────

    /// Raise an account's confirmation height. Never lowers it.
    pub fn set_confirmation_height(
        &self,
        txn: &mut WriteTransaction,
        account: &Account,
        info: ConfirmationHeightInfo,
    ) -> Result<(), LedgerError> {
        let current = self
            .store
            .confirmation_height
            .get(txn, account)?
            .map(|existing| existing.height)
            .unwrap_or(0);
        if info.height <= current {
            return Ok(());
        }
        self.store.confirmation_height.put(txn, account, &info)?;
        self.cache
            .cemented_count
            .fetch_add(info.height - current, Ordering::Relaxed);
        Ok(())
    }

    pub fn confirmation_height(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<ConfirmationHeightInfo, LedgerError> {
        Ok(self
            .store
            .confirmation_height
            .get(txn, account)?
            .unwrap_or_else(ConfirmationHeightInfo::zero))
    }

    // ── Pruning switch ──────────────────────────────────────────────────

    pub fn enable_pruning(&self) {
        self.pruning_enabled.store(true, Ordering::Relaxed);
    }

    pub fn pruning_enabled(&self) -> bool {
        self.pruning_enabled.load(Ordering::Relaxed)
    }

    // ── Shared write helpers (used by process/rollback/pruning) ─────────

    pub(crate) fn write_block(
        &self,
        txn: &mut WriteTransaction,
        saved: &SavedBlock,
    ) -> Result<(), LedgerError> {
        self.store
            .block
            .put(txn, &saved.hash(), &saved.to_store_bytes())?;
        Ok(())
    }

    /// Rewrite a block's sideband successor pointer.
    pub(crate) fn set_successor(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        successor: BlockHash,
    ) -> Result<(), LedgerError> {
        if let Some(mut saved) = self.block_get(txn, hash)? {
            saved.sideband.successor = successor;
            self.write_block(txn, &saved)?;
        }
        Ok(())
    }

    /// Mirror a rep-weight delta into the persisted representation table.
    pub(crate) fn store_rep_weight(
        &self,
        txn: &mut WriteTransaction,
        representative: &Account,
    ) -> Result<(), LedgerError> {
        if representative.is_zero() {
            return Ok(());
        }
        let weight = self.rep_weights.weight(representative);
        self.store.representation.put(txn, representative, weight)?;
        Ok(())
    }
}
