//! Block variants and sideband metadata.
//!
//! Five variants share a 256-bit Blake2b hash over a canonical byte
//! serialization. Legacy variants (open/send/receive/change) carry one
//! operation each; the state variant is universal, its subtype inferred from
//! the balance delta and the link field.

use serde::{Deserialize, Serialize};
use std::io::Cursor;
use strand_crypto::blake2b_256_multi;
use strand_types::{Account, Amount, BlockHash, Epoch, Link, Root, Signature, Timestamp};

/// Discriminant stored as the first byte of every persisted block value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Open,
    Send,
    Receive,
    Change,
    State,
}

impl BlockKind {
    pub fn tag(&self) -> u8 {
        match self {
            BlockKind::Open => 0,
            BlockKind::Send => 1,
            BlockKind::Receive => 2,
            BlockKind::Change => 3,
            BlockKind::State => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(BlockKind::Open),
            1 => Some(BlockKind::Send),
            2 => Some(BlockKind::Receive),
            3 => Some(BlockKind::Change),
            4 => Some(BlockKind::State),
            _ => None,
        }
    }
}

/// Opens an account by receiving a source send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBlock {
    pub source: BlockHash,
    pub representative: Account,
    pub account: Account,
    pub signature: Signature,
    pub work: u64,
}

/// Debits the signer's account. `balance` is the balance *after* the send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBlock {
    pub previous: BlockHash,
    pub destination: Account,
    pub balance: Amount,
    pub signature: Signature,
    pub work: u64,
}

/// Credits the signer's account from a pending send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBlock {
    pub previous: BlockHash,
    pub source: BlockHash,
    pub signature: Signature,
    pub work: u64,
}

/// Rotates the account's representative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBlock {
    pub previous: BlockHash,
    pub representative: Account,
    pub signature: Signature,
    pub work: u64,
}

/// Universal block: subtype is inferred from the balance delta against the
/// previous block and from the link field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBlock {
    pub account: Account,
    pub previous: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    pub link: Link,
    pub signature: Signature,
    pub work: u64,
}

/// A block of any variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Open(OpenBlock),
    Send(SendBlock),
    Receive(ReceiveBlock),
    Change(ChangeBlock),
    State(StateBlock),
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Open(_) => BlockKind::Open,
            Block::Send(_) => BlockKind::Send,
            Block::Receive(_) => BlockKind::Receive,
            Block::Change(_) => BlockKind::Change,
            Block::State(_) => BlockKind::State,
        }
    }

    /// The canonical hash: Blake2b-256 over the discriminant byte and the
    /// variant's fields in declaration order. Signature and work are
    /// excluded — both attest to the hash, they are not part of it.
    pub fn hash(&self) -> BlockHash {
        let tag = [self.kind().tag()];
        let bytes = match self {
            Block::Open(b) => blake2b_256_multi(&[
                &tag,
                b.source.as_bytes(),
                b.representative.as_bytes(),
                b.account.as_bytes(),
            ]),
            Block::Send(b) => blake2b_256_multi(&[
                &tag,
                b.previous.as_bytes(),
                b.destination.as_bytes(),
                &b.balance.to_be_bytes(),
            ]),
            Block::Receive(b) => {
                blake2b_256_multi(&[&tag, b.previous.as_bytes(), b.source.as_bytes()])
            }
            Block::Change(b) => {
                blake2b_256_multi(&[&tag, b.previous.as_bytes(), b.representative.as_bytes()])
            }
            Block::State(b) => blake2b_256_multi(&[
                &tag,
                b.account.as_bytes(),
                b.previous.as_bytes(),
                b.representative.as_bytes(),
                &b.balance.to_be_bytes(),
                b.link.as_bytes(),
            ]),
        };
        BlockHash::new(bytes)
    }

    /// The predecessor hash; zero for opens and state opens.
    pub fn previous(&self) -> BlockHash {
        match self {
            Block::Open(_) => BlockHash::ZERO,
            Block::Send(b) => b.previous,
            Block::Receive(b) => b.previous,
            Block::Change(b) => b.previous,
            Block::State(b) => b.previous,
        }
    }

    /// The root: `previous` when chained, the account when opening. Work is
    /// computed against the root and elections are keyed by it.
    pub fn root(&self) -> Root {
        match self {
            Block::Open(b) => Root::from(b.account),
            Block::State(b) if b.previous.is_zero() => Root::from(b.account),
            other => Root::from(other.previous()),
        }
    }

    /// The account field, where the variant carries one.
    pub fn account_field(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.account),
            Block::State(b) => Some(b.account),
            _ => None,
        }
    }

    /// The representative field, where the variant carries one.
    pub fn representative_field(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.representative),
            Block::Change(b) => Some(b.representative),
            Block::State(b) => Some(b.representative),
            _ => None,
        }
    }

    /// The balance field, where the variant carries one.
    pub fn balance_field(&self) -> Option<Amount> {
        match self {
            Block::Send(b) => Some(b.balance),
            Block::State(b) => Some(b.balance),
            _ => None,
        }
    }

    /// The referenced source send hash, for variants that receive.
    pub fn source_field(&self) -> Option<BlockHash> {
        match self {
            Block::Open(b) => Some(b.source),
            Block::Receive(b) => Some(b.source),
            _ => None,
        }
    }

    pub fn link_field(&self) -> Option<Link> {
        match self {
            Block::State(b) => Some(b.link),
            _ => None,
        }
    }

    pub fn destination_field(&self) -> Option<Account> {
        match self {
            Block::Send(b) => Some(b.destination),
            _ => None,
        }
    }

    pub fn work(&self) -> u64 {
        match self {
            Block::Open(b) => b.work,
            Block::Send(b) => b.work,
            Block::Receive(b) => b.work,
            Block::Change(b) => b.work,
            Block::State(b) => b.work,
        }
    }

    pub fn set_work(&mut self, work: u64) {
        match self {
            Block::Open(b) => b.work = work,
            Block::Send(b) => b.work = work,
            Block::Receive(b) => b.work = work,
            Block::Change(b) => b.work = work,
            Block::State(b) => b.work = work,
        }
    }

    pub fn signature(&self) -> &Signature {
        match self {
            Block::Open(b) => &b.signature,
            Block::Send(b) => &b.signature,
            Block::Receive(b) => &b.signature,
            Block::Change(b) => &b.signature,
            Block::State(b) => &b.signature,
        }
    }

    pub fn set_signature(&mut self, signature: Signature) {
        match self {
            Block::Open(b) => b.signature = signature,
            Block::Send(b) => b.signature = signature,
            Block::Receive(b) => b.signature = signature,
            Block::Change(b) => b.signature = signature,
            Block::State(b) => b.signature = signature,
        }
    }
}

/// Subtype bits plus the epoch, selecting the work threshold and recorded in
/// the sideband.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDetails {
    pub epoch: Epoch,
    pub is_send: bool,
    pub is_receive: bool,
    pub is_epoch: bool,
}

impl BlockDetails {
    pub fn new(epoch: Epoch, is_send: bool, is_receive: bool, is_epoch: bool) -> Self {
        Self {
            epoch,
            is_send,
            is_receive,
            is_epoch,
        }
    }
}

/// Metadata persisted alongside each block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sideband {
    /// Owning account (legacy blocks do not carry it themselves).
    pub account: Account,
    /// 1-based height along the chain.
    pub height: u64,
    /// Next block hash in the chain, zero at the frontier.
    pub successor: BlockHash,
    /// Balance after this block. Stored so queries and rollback never walk.
    pub balance: Amount,
    /// Local arrival time.
    pub timestamp: Timestamp,
    pub details: BlockDetails,
    /// Epoch of the consumed pending entry, for receives; `Epoch0` otherwise.
    pub source_epoch: Epoch,
}

/// A block together with its sideband, as persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedBlock {
    pub block: Block,
    pub sideband: Sideband,
}

impl SavedBlock {
    pub fn new(block: Block, sideband: Sideband) -> Self {
        Self { block, sideband }
    }

    pub fn hash(&self) -> BlockHash {
        self.block.hash()
    }

    pub fn height(&self) -> u64 {
        self.sideband.height
    }

    pub fn successor(&self) -> Option<BlockHash> {
        if self.sideband.successor.is_zero() {
            None
        } else {
            Some(self.sideband.successor)
        }
    }

    pub fn account(&self) -> Account {
        self.sideband.account
    }

    pub fn balance(&self) -> Amount {
        self.sideband.balance
    }

    /// Store encoding: one-byte kind tag, the block fields, then the
    /// sideband.
    pub fn to_store_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.block.kind().tag()];
        bincode::serialize_into(&mut out, &self.block).expect("block serialization is infallible");
        bincode::serialize_into(&mut out, &self.sideband)
            .expect("sideband serialization is infallible");
        out
    }

    pub fn from_store_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        if bytes.is_empty() {
            return Err(Box::new(bincode::ErrorKind::Custom(
                "empty block value".into(),
            )));
        }
        let mut cursor = Cursor::new(&bytes[1..]);
        let block: Block = bincode::deserialize_from(&mut cursor)?;
        let sideband: Sideband = bincode::deserialize_from(&mut cursor)?;
        Ok(Self { block, sideband })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_block() -> Block {
        Block::State(StateBlock {
            account: Account::new([1u8; 32]),
            previous: BlockHash::new([2u8; 32]),
            representative: Account::new([3u8; 32]),
            balance: Amount::raw(1000),
            link: Link::new([4u8; 32]),
            signature: Signature::ZERO,
            work: 0,
        })
    }

    fn sideband() -> Sideband {
        Sideband {
            account: Account::new([1u8; 32]),
            height: 2,
            successor: BlockHash::ZERO,
            balance: Amount::raw(1000),
            timestamp: Timestamp::new(99),
            details: BlockDetails::new(Epoch::Epoch1, true, false, false),
            source_epoch: Epoch::Epoch0,
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let block = state_block();
        assert_eq!(block.hash(), block.hash());
    }

    #[test]
    fn hash_excludes_signature_and_work() {
        let block = state_block();
        let mut signed = block.clone();
        signed.set_signature(Signature([0xFF; 64]));
        signed.set_work(123_456);
        assert_eq!(block.hash(), signed.hash());
    }

    #[test]
    fn hash_covers_every_field() {
        let base = state_block();
        let mut other = base.clone();
        if let Block::State(ref mut s) = other {
            s.balance = Amount::raw(999);
        }
        assert_ne!(base.hash(), other.hash());
    }

    #[test]
    fn variants_with_same_bytes_hash_differently() {
        let receive = Block::Receive(ReceiveBlock {
            previous: BlockHash::new([2u8; 32]),
            source: BlockHash::new([3u8; 32]),
            signature: Signature::ZERO,
            work: 0,
        });
        let change = Block::Change(ChangeBlock {
            previous: BlockHash::new([2u8; 32]),
            representative: Account::new([3u8; 32]),
            signature: Signature::ZERO,
            work: 0,
        });
        assert_ne!(receive.hash(), change.hash());
    }

    #[test]
    fn root_of_open_is_account() {
        let open = Block::Open(OpenBlock {
            source: BlockHash::new([9u8; 32]),
            representative: Account::new([3u8; 32]),
            account: Account::new([1u8; 32]),
            signature: Signature::ZERO,
            work: 0,
        });
        assert_eq!(open.root(), Root::from(Account::new([1u8; 32])));
        assert_eq!(open.previous(), BlockHash::ZERO);
    }

    #[test]
    fn root_of_state_open_is_account() {
        let mut block = state_block();
        if let Block::State(ref mut s) = block {
            s.previous = BlockHash::ZERO;
        }
        assert_eq!(block.root(), Root::from(Account::new([1u8; 32])));
    }

    #[test]
    fn root_of_chained_block_is_previous() {
        let block = state_block();
        assert_eq!(block.root(), Root::from(BlockHash::new([2u8; 32])));
    }

    #[test]
    fn store_bytes_round_trip() {
        let saved = SavedBlock::new(state_block(), sideband());
        let bytes = saved.to_store_bytes();
        assert_eq!(bytes[0], BlockKind::State.tag());
        let back = SavedBlock::from_store_bytes(&bytes).unwrap();
        assert_eq!(back, saved);
        assert_eq!(back.hash(), saved.hash());
    }

    #[test]
    fn wire_serde_preserves_hash() {
        let block = state_block();
        let bytes = bincode::serialize(&block).unwrap();
        let back: Block = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.hash(), block.hash());
    }

    #[test]
    fn kind_tag_round_trip() {
        for kind in [
            BlockKind::Open,
            BlockKind::Send,
            BlockKind::Receive,
            BlockKind::Change,
            BlockKind::State,
        ] {
            assert_eq!(BlockKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(BlockKind::from_tag(200), None);
    }
}
