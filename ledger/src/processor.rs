//! The `process` state machine: classify a candidate block against the
//! ledger and apply it when it extends a chain.
//!
//! Every check runs before any mutation, so a non-`Progress` classification
//! leaves no trace. Classification order follows the dependency chain:
//! duplicate, work floor, predecessor, signature, pending linkage, subtype
//! rules, fork, precise work threshold, apply.

use crate::block::{
    Block, BlockDetails, ChangeBlock, OpenBlock, ReceiveBlock, SavedBlock, SendBlock, Sideband,
    StateBlock,
};
use crate::error::{BlockStatus, LedgerError};
use crate::ledger::Ledger;
use std::sync::atomic::Ordering;
use strand_crypto::verify_signature;
use strand_store::{AccountInfo, WriteTransaction};
use strand_types::{Account, Amount, BlockHash, Epoch, PendingInfo, PendingKey, Timestamp};
use strand_work::{work_difficulty, WorkContext, WorkVersion};

/// Outcome of the shared pre-apply bookkeeping for chained blocks.
struct ChainPosition {
    previous: SavedBlock,
    info: AccountInfo,
    account: Account,
}

impl Ledger {
    /// Classify and, on `Progress`, apply a block.
    pub fn process(
        &self,
        txn: &mut WriteTransaction,
        block: &Block,
    ) -> Result<BlockStatus, LedgerError> {
        let hash = block.hash();
        if self.store.block.exists(txn, &hash)? || self.store.pruned.exists(txn, &hash)? {
            return Ok(BlockStatus::Old);
        }

        // Floor check with the easiest threshold: spam is rejected before
        // any further lookups. The precise, subtype-aware check runs once
        // the epoch and subtype are known.
        let difficulty = work_difficulty(WorkVersion::Work1, &block.root(), block.work());
        if difficulty < self.constants.work.min_threshold() {
            return Ok(BlockStatus::InsufficientWork);
        }

        match block {
            Block::Open(b) => self.process_open(txn, &hash, b, difficulty),
            Block::Send(b) => self.process_send(txn, &hash, b, difficulty),
            Block::Receive(b) => self.process_receive(txn, &hash, b, difficulty),
            Block::Change(b) => self.process_change(txn, &hash, b, difficulty),
            Block::State(b) => self.process_state(txn, &hash, b, difficulty),
        }
    }

    fn work_ok(&self, difficulty: u64, ctx: WorkContext) -> bool {
        difficulty >= self.constants.work.threshold(WorkVersion::Work1, &ctx)
    }

    /// Resolve predecessor and account for a chained legacy block, running
    /// the shared fork/position checks.
    fn chain_position(
        &self,
        txn: &mut WriteTransaction,
        previous: &BlockHash,
    ) -> Result<Result<ChainPosition, BlockStatus>, LedgerError> {
        let Some(prev) = self.block_get(txn, previous)? else {
            return Ok(Err(BlockStatus::GapPrevious));
        };
        let account = prev.account();
        let Some(info) = self.account_info(txn, &account)? else {
            return Err(LedgerError::Corrupted(format!(
                "block {previous} exists without account info"
            )));
        };
        if prev.successor().is_some() || info.head != *previous {
            return Ok(Err(BlockStatus::Fork));
        }
        Ok(Ok(ChainPosition {
            previous: prev,
            info,
            account,
        }))
    }

    // ── Legacy variants ─────────────────────────────────────────────────

    fn process_open(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        block: &OpenBlock,
        difficulty: u64,
    ) -> Result<BlockStatus, LedgerError> {
        if block.account.is_zero() {
            return Ok(BlockStatus::OpenedBurnAccount);
        }
        if !verify_signature(hash.as_bytes(), &block.signature, &block.account.public_key()) {
            return Ok(BlockStatus::BadSignature);
        }
        if self.account_info(txn, &block.account)?.is_some() {
            return Ok(BlockStatus::Fork);
        }
        if !self.block_or_pruned_exists(txn, &block.source)? {
            return Ok(BlockStatus::GapSource);
        }
        let key = PendingKey::new(block.account, block.source);
        let Some(pending) = self.store.pending.get(txn, &key)? else {
            return Ok(BlockStatus::Unreceivable);
        };
        // Upgraded sends need a state block to receive.
        if pending.epoch > Epoch::Epoch0 {
            return Ok(BlockStatus::Unreceivable);
        }
        if !self.work_ok(difficulty, WorkContext::new(Epoch::Epoch0, true, false)) {
            return Ok(BlockStatus::InsufficientWork);
        }

        let amount = pending.amount;
        self.store.pending.del(txn, &key)?;
        self.rep_weights.add(&block.representative, amount);
        self.store_rep_weight(txn, &block.representative)?;
        self.create_account(txn, &block.account, hash, &block.representative, amount, Epoch::Epoch0)?;
        self.append_block(
            txn,
            &Block::Open(block.clone()),
            Sideband {
                account: block.account,
                height: 1,
                successor: BlockHash::ZERO,
                balance: amount,
                timestamp: Timestamp::now(),
                details: BlockDetails::new(Epoch::Epoch0, false, true, false),
                source_epoch: pending.epoch,
            },
        )?;
        Ok(BlockStatus::Progress)
    }

    fn process_send(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        block: &SendBlock,
        difficulty: u64,
    ) -> Result<BlockStatus, LedgerError> {
        let position = match self.chain_position(txn, &block.previous)? {
            Ok(position) => position,
            Err(status) => return Ok(status),
        };
        if !verify_signature(hash.as_bytes(), &block.signature, &position.account.public_key()) {
            return Ok(BlockStatus::BadSignature);
        }
        if position.info.epoch > Epoch::Epoch0 {
            return Ok(BlockStatus::BlockPosition);
        }
        let prev_balance = position.previous.balance();
        if block.balance > prev_balance {
            return Ok(BlockStatus::NegativeSpend);
        }
        if !self.work_ok(difficulty, WorkContext::new(Epoch::Epoch0, false, false)) {
            return Ok(BlockStatus::InsufficientWork);
        }

        let amount = prev_balance - block.balance;
        self.store.pending.put(
            txn,
            &PendingKey::new(block.destination, *hash),
            &PendingInfo::new(position.account, amount, Epoch::Epoch0),
        )?;
        self.rep_weights.sub(&position.info.representative, amount);
        self.store_rep_weight(txn, &position.info.representative)?;
        self.advance_account(txn, &position, hash, block.balance, None, None)?;
        self.append_block(
            txn,
            &Block::Send(block.clone()),
            Sideband {
                account: position.account,
                height: position.info.block_count + 1,
                successor: BlockHash::ZERO,
                balance: block.balance,
                timestamp: Timestamp::now(),
                details: BlockDetails::new(Epoch::Epoch0, true, false, false),
                source_epoch: Epoch::Epoch0,
            },
        )?;
        self.set_successor(txn, &block.previous, *hash)?;
        self.swap_frontier(txn, &block.previous, hash, &position.account)?;
        Ok(BlockStatus::Progress)
    }

    fn process_receive(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        block: &ReceiveBlock,
        difficulty: u64,
    ) -> Result<BlockStatus, LedgerError> {
        let position = match self.chain_position(txn, &block.previous)? {
            Ok(position) => position,
            Err(status) => return Ok(status),
        };
        if !verify_signature(hash.as_bytes(), &block.signature, &position.account.public_key()) {
            return Ok(BlockStatus::BadSignature);
        }
        if position.info.epoch > Epoch::Epoch0 {
            return Ok(BlockStatus::BlockPosition);
        }
        if !self.block_or_pruned_exists(txn, &block.source)? {
            return Ok(BlockStatus::GapSource);
        }
        let key = PendingKey::new(position.account, block.source);
        let Some(pending) = self.store.pending.get(txn, &key)? else {
            return Ok(BlockStatus::Unreceivable);
        };
        if pending.epoch > Epoch::Epoch0 {
            return Ok(BlockStatus::Unreceivable);
        }
        if !self.work_ok(difficulty, WorkContext::new(Epoch::Epoch0, true, false)) {
            return Ok(BlockStatus::InsufficientWork);
        }

        let amount = pending.amount;
        let balance = position
            .previous
            .balance()
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Corrupted("balance overflow on receive".into()))?;
        self.store.pending.del(txn, &key)?;
        self.rep_weights.add(&position.info.representative, amount);
        self.store_rep_weight(txn, &position.info.representative)?;
        self.advance_account(txn, &position, hash, balance, None, None)?;
        self.append_block(
            txn,
            &Block::Receive(block.clone()),
            Sideband {
                account: position.account,
                height: position.info.block_count + 1,
                successor: BlockHash::ZERO,
                balance,
                timestamp: Timestamp::now(),
                details: BlockDetails::new(Epoch::Epoch0, false, true, false),
                source_epoch: pending.epoch,
            },
        )?;
        self.set_successor(txn, &block.previous, *hash)?;
        self.swap_frontier(txn, &block.previous, hash, &position.account)?;
        Ok(BlockStatus::Progress)
    }

    fn process_change(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        block: &ChangeBlock,
        difficulty: u64,
    ) -> Result<BlockStatus, LedgerError> {
        let position = match self.chain_position(txn, &block.previous)? {
            Ok(position) => position,
            Err(status) => return Ok(status),
        };
        if !verify_signature(hash.as_bytes(), &block.signature, &position.account.public_key()) {
            return Ok(BlockStatus::BadSignature);
        }
        if position.info.epoch > Epoch::Epoch0 {
            return Ok(BlockStatus::BlockPosition);
        }
        if !self.work_ok(difficulty, WorkContext::new(Epoch::Epoch0, false, false)) {
            return Ok(BlockStatus::InsufficientWork);
        }

        let balance = position.previous.balance();
        self.rep_weights.transfer(
            &position.info.representative,
            balance,
            &block.representative,
            balance,
        );
        self.store_rep_weight(txn, &position.info.representative)?;
        self.store_rep_weight(txn, &block.representative)?;
        self.advance_account(txn, &position, hash, balance, Some(block.representative), None)?;
        self.append_block(
            txn,
            &Block::Change(block.clone()),
            Sideband {
                account: position.account,
                height: position.info.block_count + 1,
                successor: BlockHash::ZERO,
                balance,
                timestamp: Timestamp::now(),
                details: BlockDetails::new(Epoch::Epoch0, false, false, false),
                source_epoch: Epoch::Epoch0,
            },
        )?;
        self.set_successor(txn, &block.previous, *hash)?;
        self.swap_frontier(txn, &block.previous, hash, &position.account)?;
        Ok(BlockStatus::Progress)
    }

    // ── State variant ───────────────────────────────────────────────────

    fn process_state(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        block: &StateBlock,
        difficulty: u64,
    ) -> Result<BlockStatus, LedgerError> {
        if block.account.is_zero() {
            return Ok(BlockStatus::OpenedBurnAccount);
        }

        let is_open = block.previous.is_zero();
        let previous = if is_open {
            None
        } else {
            match self.block_get(txn, &block.previous)? {
                Some(prev) => Some(prev),
                None => return Ok(BlockStatus::GapPrevious),
            }
        };
        let info = self.account_info(txn, &block.account)?;

        // Fork and position checks against the resolved chain.
        match (&info, &previous) {
            (Some(_), None) => return Ok(BlockStatus::Fork),
            (_, Some(prev)) if prev.account() != block.account => {
                return Ok(BlockStatus::BlockPosition)
            }
            (Some(info), Some(prev)) => {
                if prev.successor().is_some() || info.head != block.previous {
                    return Ok(BlockStatus::Fork);
                }
            }
            (None, Some(_)) => {
                // Previous belongs to this account yet the account record is
                // gone; only possible mid-rollback, treat as missing.
                return Ok(BlockStatus::GapPrevious);
            }
            (None, None) => {}
        }

        let prev_balance = previous.as_ref().map(|p| p.balance()).unwrap_or(Amount::ZERO);
        if self.is_epoch_link(&block.link) && block.balance == prev_balance {
            return self.process_state_epoch(txn, hash, block, difficulty, info, previous);
        }

        if !verify_signature(hash.as_bytes(), &block.signature, &block.account.public_key()) {
            return Ok(BlockStatus::BadSignature);
        }

        let account_epoch = info.as_ref().map(|i| i.epoch).unwrap_or_default();
        let old_rep = info.as_ref().map(|i| i.representative);

        if block.balance < prev_balance {
            // Send; link is the destination, possibly the burn account.
            let epoch = account_epoch;
            if !self.work_ok(difficulty, WorkContext::new(epoch, false, false)) {
                return Ok(BlockStatus::InsufficientWork);
            }
            let amount = prev_balance - block.balance;
            self.store.pending.put(
                txn,
                &PendingKey::new(block.link.as_account(), *hash),
                &PendingInfo::new(block.account, amount, epoch),
            )?;
            self.apply_state(
                txn,
                hash,
                block,
                info,
                old_rep,
                prev_balance,
                epoch,
                BlockDetails::new(epoch, true, false, false),
                Epoch::Epoch0,
            )?;
            Ok(BlockStatus::Progress)
        } else if block.balance > prev_balance {
            // Receive; link is the source send.
            if block.link.is_zero() {
                return Ok(BlockStatus::GapSource);
            }
            let source = block.link.as_block_hash();
            if !self.block_or_pruned_exists(txn, &source)? {
                return Ok(BlockStatus::GapSource);
            }
            let key = PendingKey::new(block.account, source);
            let Some(pending) = self.store.pending.get(txn, &key)? else {
                return Ok(BlockStatus::Unreceivable);
            };
            if pending.amount != block.balance - prev_balance {
                return Ok(BlockStatus::BalanceMismatch);
            }
            let epoch = account_epoch.max(pending.epoch);
            if !self.work_ok(difficulty, WorkContext::new(epoch, true, false)) {
                return Ok(BlockStatus::InsufficientWork);
            }
            self.store.pending.del(txn, &key)?;
            self.apply_state(
                txn,
                hash,
                block,
                info,
                old_rep,
                prev_balance,
                epoch,
                BlockDetails::new(epoch, false, true, false),
                pending.epoch,
            )?;
            Ok(BlockStatus::Progress)
        } else {
            // Unchanged balance: a representative change. A non-zero,
            // non-epoch link with no balance movement is malformed, and an
            // open must receive something.
            if !block.link.is_zero() {
                return Ok(BlockStatus::BalanceMismatch);
            }
            if is_open {
                return Ok(BlockStatus::GapSource);
            }
            let epoch = account_epoch;
            if !self.work_ok(difficulty, WorkContext::new(epoch, false, false)) {
                return Ok(BlockStatus::InsufficientWork);
            }
            self.apply_state(
                txn,
                hash,
                block,
                info,
                old_rep,
                prev_balance,
                epoch,
                BlockDetails::new(epoch, false, false, false),
                Epoch::Epoch0,
            )?;
            Ok(BlockStatus::Progress)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_state_epoch(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        block: &StateBlock,
        difficulty: u64,
        info: Option<AccountInfo>,
        previous: Option<SavedBlock>,
    ) -> Result<BlockStatus, LedgerError> {
        let signer = self
            .epoch_signer(&block.link)
            .expect("epoch link verified by caller");
        if !verify_signature(hash.as_bytes(), &block.signature, &signer.public_key()) {
            return Ok(BlockStatus::BadSignature);
        }
        let epoch = self
            .constants
            .epochs
            .epoch(&block.link)
            .expect("epoch link verified by caller");

        match info {
            Some(info) => {
                if epoch <= info.epoch {
                    return Ok(BlockStatus::BlockPosition);
                }
                if block.representative != info.representative {
                    return Ok(BlockStatus::RepresentativeMismatch);
                }
                if !self.work_ok(difficulty, WorkContext::new(epoch, false, true)) {
                    return Ok(BlockStatus::InsufficientWork);
                }
                let prev = previous.expect("account info implies a predecessor");
                let balance = prev.balance();
                // Balance and representative are untouched; only the epoch
                // and the head move.
                self.apply_state(
                    txn,
                    hash,
                    block,
                    Some(info),
                    Some(block.representative),
                    balance,
                    epoch,
                    BlockDetails::new(epoch, false, false, true),
                    Epoch::Epoch0,
                )?;
                Ok(BlockStatus::Progress)
            }
            None => {
                // Epoch-open: creates the account shell so pending sends can
                // later be received under the new rules.
                if !block.representative.is_zero() {
                    return Ok(BlockStatus::RepresentativeMismatch);
                }
                if !self.store.pending.any_for_account(txn, &block.account)? {
                    return Ok(BlockStatus::GapEpochOpenPending);
                }
                if !self.work_ok(difficulty, WorkContext::new(epoch, false, true)) {
                    return Ok(BlockStatus::InsufficientWork);
                }
                self.create_account(txn, &block.account, hash, &Account::ZERO, Amount::ZERO, epoch)?;
                self.append_block(
                    txn,
                    &Block::State(block.clone()),
                    Sideband {
                        account: block.account,
                        height: 1,
                        successor: BlockHash::ZERO,
                        balance: Amount::ZERO,
                        timestamp: Timestamp::now(),
                        details: BlockDetails::new(epoch, false, false, true),
                        source_epoch: Epoch::Epoch0,
                    },
                )?;
                Ok(BlockStatus::Progress)
            }
        }
    }

    /// Shared apply for state blocks: rep weights, account info, frontier,
    /// successor, and the block write.
    #[allow(clippy::too_many_arguments)]
    fn apply_state(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        block: &StateBlock,
        info: Option<AccountInfo>,
        old_rep: Option<Account>,
        prev_balance: Amount,
        epoch: Epoch,
        details: BlockDetails,
        source_epoch: Epoch,
    ) -> Result<(), LedgerError> {
        match old_rep {
            Some(old_rep) => {
                self.rep_weights
                    .transfer(&old_rep, prev_balance, &block.representative, block.balance);
                self.store_rep_weight(txn, &old_rep)?;
            }
            None => self.rep_weights.add(&block.representative, block.balance),
        }
        self.store_rep_weight(txn, &block.representative)?;

        let height = match &info {
            Some(info) => {
                let previous = self
                    .block_get(txn, &block.previous)?
                    .expect("predecessor checked by caller");
                let position = ChainPosition {
                    previous,
                    info: info.clone(),
                    account: block.account,
                };
                self.advance_account(
                    txn,
                    &position,
                    hash,
                    block.balance,
                    Some(block.representative),
                    Some(epoch),
                )?;
                self.set_successor(txn, &block.previous, *hash)?;
                self.swap_frontier(txn, &block.previous, hash, &block.account)?;
                info.block_count + 1
            }
            None => {
                self.create_account(
                    txn,
                    &block.account,
                    hash,
                    &block.representative,
                    block.balance,
                    epoch,
                )?;
                1
            }
        };

        self.append_block(
            txn,
            &Block::State(block.clone()),
            Sideband {
                account: block.account,
                height,
                successor: BlockHash::ZERO,
                balance: block.balance,
                timestamp: Timestamp::now(),
                details,
                source_epoch,
            },
        )?;
        Ok(())
    }

    // ── Apply primitives ────────────────────────────────────────────────

    fn append_block(
        &self,
        txn: &mut WriteTransaction,
        block: &Block,
        sideband: Sideband,
    ) -> Result<(), LedgerError> {
        let saved = SavedBlock::new(block.clone(), sideband);
        self.write_block(txn, &saved)?;
        self.cache.block_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_account(
        &self,
        txn: &mut WriteTransaction,
        account: &Account,
        open_hash: &BlockHash,
        representative: &Account,
        balance: Amount,
        epoch: Epoch,
    ) -> Result<(), LedgerError> {
        self.store.account.put(
            txn,
            account,
            &AccountInfo {
                head: *open_hash,
                open_block: *open_hash,
                balance,
                modified: Timestamp::now(),
                block_count: 1,
                representative: *representative,
                epoch,
            },
        )?;
        self.store.frontier.put(txn, open_hash, account)?;
        self.cache.account_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn advance_account(
        &self,
        txn: &mut WriteTransaction,
        position: &ChainPosition,
        new_head: &BlockHash,
        balance: Amount,
        representative: Option<Account>,
        epoch: Option<Epoch>,
    ) -> Result<(), LedgerError> {
        let mut info = position.info.clone();
        info.head = *new_head;
        info.balance = balance;
        info.modified = Timestamp::now();
        info.block_count += 1;
        if let Some(representative) = representative {
            info.representative = representative;
        }
        if let Some(epoch) = epoch {
            info.epoch = epoch;
        }
        self.store.account.put(txn, &position.account, &info)?;
        Ok(())
    }

    fn swap_frontier(
        &self,
        txn: &mut WriteTransaction,
        old_head: &BlockHash,
        new_head: &BlockHash,
        account: &Account,
    ) -> Result<(), LedgerError> {
        self.store.frontier.del(txn, old_head)?;
        self.store.frontier.put(txn, new_head, account)?;
        Ok(())
    }
}
