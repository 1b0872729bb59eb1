//! The strand node core: the block-processing pipeline over the ledger.
//!
//! Peers inject blocks and votes; the block processor validates and applies
//! them serially; elections resolve forks by stake-weighted voting; the
//! cementer makes confirmed prefixes irreversible; the pruner erases
//! deeply-cemented history.

pub mod block_processor;
pub mod bootstrap_server;
pub mod cementer;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod logging;
pub mod node;
pub mod recently_cemented;
pub mod stats;
pub mod unchecked;
pub mod vote_processor;
pub mod write_queue;

pub use block_processor::{BlockProcessor, BlockSource, ProcessedItem};
pub use bootstrap_server::{bulk_pull, bulk_pull_account, frontier_req, BulkPullAccountResponse};
pub use cementer::Cementer;
pub use config::NodeConfig;
pub use error::NodeError;
pub use event_bus::{EventBus, NodeEvent};
pub use logging::{init_logging, LogFormat};
pub use node::{Node, TickResult};
pub use recently_cemented::RecentlyCemented;
pub use stats::{counter, StatsCounter};
pub use unchecked::UncheckedMap;
pub use vote_processor::{VoteDispatch, VoteProcessor};
pub use write_queue::{WriteGuard, WriteQueue, Writer};
