//! strand daemon — runs the block-processing core.
//!
//! The wire layer is pluggable and not part of this binary; the daemon opens
//! the store, drives the pipeline tick loop, and performs the periodic
//! maintenance (online-weight sampling, pruning, vote generation).

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use strand_crypto::keypair_from_seed;
use strand_ledger::LedgerConstants;
use strand_node::{init_logging, EventBus, LogFormat, Node, NodeConfig};
use strand_types::Timestamp;
use strand_work::WorkThresholds;

#[derive(Parser)]
#[command(name = "strand-daemon", about = "strand ledger node")]
struct Cli {
    /// Data directory for ledger storage.
    #[arg(long, default_value = "./strand_data")]
    data_dir: PathBuf,

    /// Network: "live" uses production work thresholds, "dev" disables work.
    #[arg(long, default_value = "live")]
    network: String,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON logs instead of human-readable lines.
    #[arg(long)]
    json_logs: bool,

    /// Enable pruning of deeply-cemented history.
    #[arg(long)]
    enable_pruning: bool,

    /// Hex seed of a representative key for local vote generation.
    #[arg(long, env = "STRAND_REP_SEED")]
    rep_seed: Option<String>,

    /// Seconds between online-weight samples.
    #[arg(long, default_value_t = 60)]
    sample_interval_secs: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    init_logging(format, &cli.log_level);

    let constants = match cli.network.as_str() {
        "dev" => LedgerConstants::dev(),
        _ => LedgerConstants::with_genesis_key(
            WorkThresholds::mainnet(),
            strand_ledger::dev_genesis_key(),
        ),
    };

    let rep_key = match &cli.rep_seed {
        Some(seed_hex) => {
            let bytes = hex::decode(seed_hex).context("rep seed is not valid hex")?;
            let seed: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("rep seed must be 32 bytes"))?;
            Some(keypair_from_seed(&seed))
        }
        None => None,
    };

    let mut config = NodeConfig::default();
    config.pruning_enabled = cli.enable_pruning;

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating data dir {}", cli.data_dir.display()))?;
    let node = Node::open(&cli.data_dir, constants, config, EventBus::new(), rep_key)
        .context("opening node")?;
    tracing::info!(data_dir = %cli.data_dir.display(), network = %cli.network, "node started");

    let mut last_sample = Timestamp::now();
    loop {
        let now = Timestamp::now();
        let tick = node.tick(now)?;
        if !tick.cemented.is_empty() {
            tracing::info!(count = tick.cemented.len(), "cemented blocks");
        }

        if last_sample.has_expired(cli.sample_interval_secs, now) {
            node.sample_online_weight(now)?;
            node.generate_votes(now, false);
            if cli.enable_pruning {
                let pruned = node.prune(now, 256)?;
                if pruned > 0 {
                    tracing::info!(count = pruned, "pruned block bodies");
                }
            }
            last_sample = now;
        }

        if tick.processed.is_empty() && tick.cemented.is_empty() {
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}
