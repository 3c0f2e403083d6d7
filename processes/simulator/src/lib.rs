//! Staking simulator process library
//! Drives the consensus modules round by round against a persisted store

pub mod round;
pub mod simulator_config;

pub use round::{check_initialised, BettingResults, Round};
pub use simulator_config::SimulatorConfig;

use anyhow::Result;
use rand::RngCore;
use stakesim_common::store::{KeyValueStore, SimulationStore};
use stakesim_module_genesis_bootstrapper::{bootstrap, Genesis};
use tracing::info;

/// Wipe `store` and write a fresh genesis into it
pub fn bootstrap_store<S: KeyValueStore>(
    store: &mut SimulationStore<S>,
    config: &SimulatorConfig,
    rng: &mut dyn RngCore,
) -> Result<Genesis> {
    let genesis = bootstrap(&config.genesis, rng)?;
    store.clear()?;
    store.set_validators(&genesis.validators)?;
    store.set_global_seed(&genesis.global_seed)?;
    info!(validators = genesis.validators.len(), "Store bootstrapped");
    Ok(genesis)
}

/// Run `rounds` rounds back to back, each `block_time` seconds after the
/// last, starting at `start` (seconds)
pub fn run_rounds<S: KeyValueStore>(
    store: &mut SimulationStore<S>,
    config: &SimulatorConfig,
    rng: &mut dyn RngCore,
    rounds: u64,
    start: u64,
) -> Result<Vec<Round>> {
    let block_time = config.rewards.block_time.round().max(1.0) as u64;
    (0..rounds)
        .map(|i| Round::run(&mut *store, config, &mut *rng, start + i * block_time))
        .collect()
}
