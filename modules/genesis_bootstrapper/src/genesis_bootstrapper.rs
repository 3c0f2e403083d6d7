//! Staking simulator genesis bootstrapper module
//! Generates the initial validator set and global seed, and registers
//! user validators

use anyhow::{bail, Result};
use rand::{Rng, RngCore};
use serde::Deserialize;
use stakesim_common::{Address, Ether, HexValue, SimulationError, Validator, ValidatorId};
use stakesim_module_randao::commit;
use tracing::info;

/// Smallest stake accepted when registering a validator
pub const MIN_STAKE: Ether = 32.0;

/// Longest commit chain a validator may register
pub const MAX_HASH_STEPS: u32 = 32;

const SECRET_BYTES: usize = 16;
const SEED_BYTES: usize = 32;

/// `[genesis]` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GenesisParams {
    pub validators: usize,
    pub min_stake: u64,
    pub max_stake: u64,
    pub max_hash_steps: u32,
    /// Seed for the simulator's random number generator
    pub seed: Option<u64>,
}

impl Default for GenesisParams {
    fn default() -> Self {
        Self {
            validators: 15,
            min_stake: 32,
            max_stake: 500,
            max_hash_steps: MAX_HASH_STEPS,
            seed: None,
        }
    }
}

impl GenesisParams {
    pub fn validate(&self) -> Result<()> {
        if self.validators == 0 {
            bail!("genesis validators must be at least 1");
        }
        if self.min_stake == 0 || self.min_stake >= self.max_stake {
            bail!(
                "genesis stakes must satisfy 0 < min-stake < max-stake, got {}..{}",
                self.min_stake,
                self.max_stake
            );
        }
        if !(1..=MAX_HASH_STEPS).contains(&self.max_hash_steps) {
            bail!("genesis max-hash-steps must lie in 1..={MAX_HASH_STEPS}");
        }
        Ok(())
    }
}

/// Initial state written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct Genesis {
    pub validators: Vec<Validator>,
    pub global_seed: HexValue,
}

/// Details a user supplies when staking
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub stake: Ether,
    pub secret: String,
    pub hash_steps: u32,
    pub withdrawal_address: Address,
}

pub fn random_secret(rng: &mut dyn RngCore) -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Fresh random global seed
pub fn initial_global_seed(rng: &mut dyn RngCore) -> HexValue {
    let mut bytes = [0u8; SEED_BYTES];
    rng.fill_bytes(&mut bytes);
    HexValue::from_bytes(&bytes)
}

fn new_validator(
    id: ValidatorId,
    stake: Ether,
    secret: String,
    hash_steps: u32,
    withdrawal_address: Address,
) -> Result<Validator, SimulationError> {
    let commitment = commit(&secret, hash_steps)?;
    Ok(Validator {
        id,
        stake,
        withdrawal_address,
        randao_reveal: commitment.commitment.clone(),
        randao_commitment: commitment.commitment,
        hash_steps,
        reveals_made: 0,
        secret_phrase: Some(secret),
        slashed: false,
    })
}

/// `params.validators` validators with ids from 1, whole-ETH stakes in
/// `[min_stake, max_stake)` and random commit chains
pub fn generate_validator_set(
    params: &GenesisParams,
    rng: &mut dyn RngCore,
) -> Result<Vec<Validator>, SimulationError> {
    (1..=params.validators as ValidatorId)
        .map(|id| {
            let stake = rng.random_range(params.min_stake..params.max_stake) as Ether;
            let hash_steps = rng.random_range(1..=params.max_hash_steps);
            let secret = random_secret(&mut *rng);
            let address = Address::random(&mut *rng);
            new_validator(id, stake, secret, hash_steps, address)
        })
        .collect()
}

/// Add a user validator, returning its id
pub fn register_validator(
    validators: &mut Vec<Validator>,
    registration: Registration,
) -> Result<ValidatorId, SimulationError> {
    if !registration.stake.is_finite() || registration.stake < MIN_STAKE {
        return Err(SimulationError::invalid_input(format!(
            "stake must be at least {MIN_STAKE} ETH, got {}",
            registration.stake
        )));
    }
    if !(1..=MAX_HASH_STEPS).contains(&registration.hash_steps) {
        return Err(SimulationError::invalid_input(format!(
            "hash steps must lie in 1..={MAX_HASH_STEPS}, got {}",
            registration.hash_steps
        )));
    }

    let id = validators.iter().map(|v| v.id).max().unwrap_or(0) + 1;
    let validator = new_validator(
        id,
        registration.stake,
        registration.secret,
        registration.hash_steps,
        registration.withdrawal_address,
    )?;
    info!(validator = id, stake = validator.stake, commitment = %validator.randao_commitment, "Registered validator");
    validators.push(validator);
    Ok(id)
}

/// Generate validators and seed from scratch
pub fn bootstrap(params: &GenesisParams, rng: &mut dyn RngCore) -> Result<Genesis> {
    params.validate()?;
    let validators = generate_validator_set(params, &mut *rng)?;
    let global_seed = initial_global_seed(rng);
    let tvl: Ether = validators.iter().map(|v| v.stake).sum();
    info!(validators = validators.len(), tvl, seed = %global_seed, "Genesis complete");
    Ok(Genesis {
        validators,
        global_seed,
    })
}
