//! Typed state-block builder.

use strand_crypto::sign_message;
use strand_ledger::{Block, StateBlock};
use strand_types::{Account, Amount, BlockHash, Epoch, KeyPair, Link, Signature};
use strand_work::{CancelToken, WorkError, WorkGenerator, WorkThresholds, WorkContext, WorkVersion};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("send amount {amount} exceeds balance {balance}")]
    InsufficientBalance { balance: Amount, amount: Amount },

    #[error(transparent)]
    Work(#[from] WorkError),
}

/// Builds signed state blocks on top of a known chain head.
///
/// The caller supplies the current head and balance (from `account_info`);
/// the builder derives the subtype fields, signs, and attaches work for the
/// appropriate root and threshold.
pub struct BlockBuilder {
    key: KeyPair,
    thresholds: WorkThresholds,
    generator: WorkGenerator,
}

impl BlockBuilder {
    pub fn new(key: KeyPair, thresholds: WorkThresholds) -> Self {
        Self {
            key,
            thresholds,
            generator: WorkGenerator::new(),
        }
    }

    pub fn account(&self) -> Account {
        Account::from(self.key.public)
    }

    /// A send: debit `amount` toward `destination`.
    pub fn send(
        &self,
        previous: BlockHash,
        balance: Amount,
        representative: Account,
        epoch: Epoch,
        destination: Account,
        amount: Amount,
    ) -> Result<Block, BuilderError> {
        let balance_after = balance
            .checked_sub(amount)
            .ok_or(BuilderError::InsufficientBalance { balance, amount })?;
        self.finish(
            StateBlock {
                account: self.account(),
                previous,
                representative,
                balance: balance_after,
                link: destination.as_link(),
                signature: Signature::ZERO,
                work: 0,
            },
            WorkContext::new(epoch, false, false),
        )
    }

    /// A receive of `amount` from the pending send `source`. Pass the zero
    /// hash as `previous` to open the account.
    pub fn receive(
        &self,
        previous: BlockHash,
        balance: Amount,
        representative: Account,
        epoch: Epoch,
        source: BlockHash,
        amount: Amount,
    ) -> Result<Block, BuilderError> {
        self.finish(
            StateBlock {
                account: self.account(),
                previous,
                representative,
                balance: balance.saturating_add(amount),
                link: Link::from(source),
                signature: Signature::ZERO,
                work: 0,
            },
            WorkContext::new(epoch, true, false),
        )
    }

    /// A representative rotation; balance unchanged.
    pub fn change(
        &self,
        previous: BlockHash,
        balance: Amount,
        epoch: Epoch,
        new_representative: Account,
    ) -> Result<Block, BuilderError> {
        self.finish(
            StateBlock {
                account: self.account(),
                previous,
                representative: new_representative,
                balance,
                link: Link::ZERO,
                signature: Signature::ZERO,
                work: 0,
            },
            WorkContext::new(epoch, false, false),
        )
    }

    fn finish(&self, block: StateBlock, ctx: WorkContext) -> Result<Block, BuilderError> {
        let mut block = Block::State(block);
        let hash = block.hash();
        block.set_signature(sign_message(hash.as_bytes(), &self.key.private));
        let threshold = self.thresholds.threshold(WorkVersion::Work1, &ctx);
        let work =
            self.generator
                .generate(WorkVersion::Work1, &block.root(), threshold, &CancelToken::new())?;
        block.set_work(work);
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_crypto::{keypair_from_seed, verify_signature};

    fn builder() -> BlockBuilder {
        BlockBuilder::new(keypair_from_seed(&[8u8; 32]), WorkThresholds::dev())
    }

    #[test]
    fn send_block_is_signed_and_typed() {
        let b = builder();
        let block = b
            .send(
                BlockHash::new([1u8; 32]),
                Amount::raw(100),
                b.account(),
                Epoch::Epoch1,
                Account::new([9u8; 32]),
                Amount::raw(40),
            )
            .unwrap();
        assert_eq!(block.balance_field(), Some(Amount::raw(60)));
        assert_eq!(
            block.link_field().map(|l| l.as_account()),
            Some(Account::new([9u8; 32]))
        );
        let hash = block.hash();
        assert!(verify_signature(
            hash.as_bytes(),
            block.signature(),
            &b.account().public_key()
        ));
    }

    #[test]
    fn overdraw_is_refused() {
        let b = builder();
        let result = b.send(
            BlockHash::new([1u8; 32]),
            Amount::raw(10),
            b.account(),
            Epoch::Epoch1,
            Account::new([9u8; 32]),
            Amount::raw(40),
        );
        assert!(matches!(
            result,
            Err(BuilderError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn open_receive_uses_account_as_root() {
        let b = builder();
        let block = b
            .receive(
                BlockHash::ZERO,
                Amount::ZERO,
                b.account(),
                Epoch::Epoch0,
                BlockHash::new([7u8; 32]),
                Amount::raw(25),
            )
            .unwrap();
        assert_eq!(block.root().as_bytes(), b.account().as_bytes());
        assert_eq!(block.balance_field(), Some(Amount::raw(25)));
    }

    #[test]
    fn change_keeps_balance() {
        let b = builder();
        let block = b
            .change(
                BlockHash::new([1u8; 32]),
                Amount::raw(77),
                Epoch::Epoch2,
                Account::new([3u8; 32]),
            )
            .unwrap();
        assert_eq!(block.balance_field(), Some(Amount::raw(77)));
        assert!(block.link_field().unwrap().is_zero());
    }
}
