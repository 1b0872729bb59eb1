//! Wire message payloads.
//!
//! Framing, handshakes, and peer discovery live in the network layer; this
//! crate only defines the payloads the block-processing core consumes and
//! serves. Per-peer delivery is ordered, cross-peer delivery is not.

use serde::{Deserialize, Serialize};
use strand_consensus::Vote;
use strand_ledger::Block;
use strand_types::{Account, Amount, BlockHash, Root, Timestamp};

/// Protocol version spoken by this node.
pub const PROTOCOL_VERSION: u16 = 1;

/// Network instance discriminator, first bytes of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkId {
    Live,
    Beta,
    Dev,
}

/// Header present on every wire message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub network: NetworkId,
    pub protocol_version: u16,
}

impl MessageHeader {
    pub fn new(network: NetworkId) -> Self {
        Self {
            network,
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// A block announcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publish {
    pub header: MessageHeader,
    pub block: Block,
}

/// Request for votes over specific candidates. Roots are included so the
/// receiver can answer even when it only knows a sibling of `hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmReq {
    pub header: MessageHeader,
    pub roots_hashes: Vec<(Root, BlockHash)>,
}

/// A vote, solicited or not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmAck {
    pub header: MessageHeader,
    pub vote: Vote,
}

/// Server-side chain pull: enumerate blocks from `start` back toward `end`
/// (or the account origin), newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkPull {
    pub header: MessageHeader,
    /// A block hash, or an account whose frontier is the start.
    pub start: Root,
    /// Stop before this hash; zero walks to the origin.
    pub end: BlockHash,
    /// Maximum blocks to return; `None` means unbounded.
    pub count: Option<u32>,
}

/// Server-side frontier scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierReq {
    pub header: MessageHeader,
    /// First account to report, inclusive.
    pub start: Account,
    /// Only accounts modified within this many seconds; `u64::MAX` = all.
    pub age_secs: u64,
    pub count: u32,
    /// Report cemented frontiers instead of head frontiers.
    pub only_confirmed: bool,
}

/// One frontier in a `FrontierReq` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub account: Account,
    pub frontier: BlockHash,
}

/// Flags controlling a `BulkPullAccount` response shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkPullAccountFlags {
    /// Pending hashes with amounts.
    PendingHashAndAmount,
    /// Distinct source addresses only.
    PendingAddressOnly,
}

/// Server-side pending enumeration for one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkPullAccount {
    pub header: MessageHeader,
    pub account: Account,
    pub minimum_amount: Amount,
    pub flags: BulkPullAccountFlags,
}

/// One pending entry in a `BulkPullAccount` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub hash: BlockHash,
    pub amount: Amount,
    pub source: Account,
}

/// Liveness probe carrying known peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keepalive {
    pub header: MessageHeader,
    pub peers: Vec<String>,
    pub sent_at: Timestamp,
}

/// Every message the core accepts from the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    Publish(Publish),
    ConfirmReq(ConfirmReq),
    ConfirmAck(ConfirmAck),
    BulkPull(BulkPull),
    FrontierReq(FrontierReq),
    BulkPullAccount(BulkPullAccount),
    Keepalive(Keepalive),
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_crypto::keypair_from_seed;
    use strand_ledger::{SendBlock, StateBlock};
    use strand_types::{Link, Signature};

    fn header() -> MessageHeader {
        MessageHeader::new(NetworkId::Dev)
    }

    #[test]
    fn publish_round_trip_preserves_block_hash() {
        let block = Block::State(StateBlock {
            account: Account::new([1u8; 32]),
            previous: BlockHash::new([2u8; 32]),
            representative: Account::new([3u8; 32]),
            balance: Amount::raw(10),
            link: Link::ZERO,
            signature: Signature::ZERO,
            work: 7,
        });
        let msg = WireMessage::Publish(Publish {
            header: header(),
            block: block.clone(),
        });
        let bytes = bincode::serialize(&msg).unwrap();
        let back: WireMessage = bincode::deserialize(&bytes).unwrap();
        match back {
            WireMessage::Publish(publish) => assert_eq!(publish.block.hash(), block.hash()),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn confirm_ack_round_trip_preserves_signature() {
        let key = keypair_from_seed(&[5u8; 32]);
        let vote = Vote::new(&key, 9, vec![BlockHash::new([1u8; 32])]);
        let msg = WireMessage::ConfirmAck(ConfirmAck {
            header: header(),
            vote: vote.clone(),
        });
        let bytes = bincode::serialize(&msg).unwrap();
        let back: WireMessage = bincode::deserialize(&bytes).unwrap();
        match back {
            WireMessage::ConfirmAck(ack) => {
                assert_eq!(ack.vote, vote);
                assert!(ack.vote.validate().is_ok());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn legacy_blocks_survive_the_wire() {
        let block = Block::Send(SendBlock {
            previous: BlockHash::new([4u8; 32]),
            destination: Account::new([5u8; 32]),
            balance: Amount::raw(99),
            signature: Signature::ZERO,
            work: 1,
        });
        let msg = Publish {
            header: header(),
            block: block.clone(),
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let back: Publish = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.block, block);
    }
}
