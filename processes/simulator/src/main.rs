//! 'main' for the staking simulator process

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use config::{Config, Environment, File};
use rand::{rngs::StdRng, SeedableRng};
use stakesim_common::store::{JsonFileStore, KeyValueStore, MemoryStore, SimulationStore};
use stakesim_simulator::{bootstrap_store, check_initialised, run_rounds, SimulatorConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[derive(Parser, Debug)]
#[command(name = "stakesim")]
#[command(about = "Proof-of-stake consensus round simulator")]
struct Args {
    /// Configuration file, without extension
    #[arg(short, long, default_value = "simulator")]
    config: String,

    /// Write a fresh genesis into the store before running
    #[arg(long)]
    bootstrap: bool,

    /// Number of rounds to run
    #[arg(short, long, default_value = "1")]
    rounds: u64,

    /// JSON file holding persisted state; in-memory when omitted
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Seed for the random number generator, overriding `genesis.seed`
    #[arg(long)]
    seed: Option<u64>,
}

fn simulate<S: KeyValueStore>(
    store: S,
    fresh: bool,
    rounds: u64,
    config: &SimulatorConfig,
    rng: &mut StdRng,
) -> Result<()> {
    let mut store = SimulationStore::new(store);
    if fresh {
        bootstrap_store(&mut store, config, rng)?;
    } else {
        check_initialised(&store).context("Store holds no simulation; run with --bootstrap")?;
    }

    let start = u64::try_from(Utc::now().timestamp()).context("Clock is before the epoch")?;
    let rounds = run_rounds(&mut store, config, rng, rounds, start)?;

    for round in &rounds {
        let finalized = round.finalized();
        info!(
            number = finalized.block_number,
            proposer = finalized.proposer,
            finalized = %round.fork.finalized_chain,
            bets = round.settlement.bets.len(),
            "Finalized block"
        );
    }
    if let Some(last) = rounds.last() {
        let tvl: f64 = last.validators.iter().map(|v| v.stake).sum();
        info!(rounds = rounds.len(), tvl, seed = %last.global_seed, "Simulation complete");
    }
    Ok(())
}

/// Standard main
pub fn main() -> Result<()> {
    let args = Args::parse();

    // Standard logging using RUST_LOG for log levels
    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
    Registry::default().with(fmt_layer).init();

    info!("Staking simulator process");

    // Read the config
    let config = Config::builder()
        .add_source(File::with_name(&args.config))
        .add_source(Environment::with_prefix("STAKESIM"))
        .build()
        .with_context(|| format!("Failed to read configuration '{}'", args.config))?;
    let config = SimulatorConfig::new(&config)?;

    let mut rng = match args.seed.or(config.genesis.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // An in-memory store always starts empty
    let fresh = args.bootstrap || config.startup.is_genesis() || args.store.is_none();
    match &args.store {
        Some(path) => simulate(JsonFileStore::open(path)?, fresh, args.rounds, &config, &mut rng)?,
        None => simulate(MemoryStore::new(), fresh, args.rounds, &config, &mut rng)?,
    }

    // Bye!
    info!("Exiting");

    Ok(())
}
