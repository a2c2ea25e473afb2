//! surety-node: runs a flight surety instance with a simulated oracle fleet
//!
//! Boots the instance from a TOML config, registers the oracle fleet, plays
//! the configured scenario and logs every flight's status and every insured
//! passenger's credit. Exits non-zero if the flights do not resolve in time.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use surety_node::{run_scenario, NodeConfig};

#[derive(Parser)]
#[command(name = "surety-node")]
#[command(about = "Flight delay insurance node with a simulated oracle fleet")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "surety-node.toml", env = "SURETY_CONFIG")]
    config: PathBuf,

    /// Number of oracles to register (overrides config file)
    #[arg(long, env = "SURETY_ORACLES")]
    oracles: Option<usize>,

    /// Seed for oracle index derivation (overrides config file)
    #[arg(long, env = "SURETY_INDEX_SEED")]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("surety_node=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting surety-node");
    info!("Config file: {}", cli.config.display());

    let mut config = if cli.config.exists() {
        NodeConfig::load(&cli.config)?
    } else {
        info!("Config file not found, using defaults");
        NodeConfig::default()
    };

    if let Some(oracles) = cli.oracles {
        config.worker.oracle_count = oracles;
    }
    if let Some(seed) = cli.seed {
        config.surety.index_seed = seed;
    }

    info!(
        instance_id = %config.surety.instance_id,
        oracles = config.worker.oracle_count,
        flights = config.scenario.flights.len(),
        "Running scenario"
    );

    let report = run_scenario(&config).await?;

    for (flight, status) in &report.flights {
        println!("{flight}: {status}");
    }
    for (passenger, balance) in &report.balances {
        println!("{passenger}: {balance}");
    }
    Ok(())
}
