//! Iterated-hash commit chains
//!
//! A validator commits to `h_steps` where `h_0 = secret` and
//! `h_i = sha3(text of h_(i-1))`. Reveals walk back down the chain one
//! layer per round, so each reveal hashes to the one before it.

use serde::{Deserialize, Serialize};
use stakesim_common::{crypto::sha3_hex, HexValue, SimulationError, Validator};
use std::iter;
use tracing::debug;

/// Published commitment and the chain length behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandaoCommitment {
    pub commitment: HexValue,
    pub steps: u32,
}

impl RandaoCommitment {
    /// Whether `secret` unrolls to this commitment
    pub fn verify(&self, secret: &str) -> bool {
        unroll_commit_chain(secret, self.steps).is_ok_and(|h| h == self.commitment)
    }
}

fn check_inputs(secret: &str, steps: u32) -> Result<(), SimulationError> {
    if secret.is_empty() {
        return Err(SimulationError::invalid_input("RANDAO secret must not be empty"));
    }
    if steps < 1 {
        return Err(SimulationError::invalid_input("RANDAO hash steps must be at least 1"));
    }
    Ok(())
}

/// Every layer `h_1 ..= h_steps`, in hashing order
pub fn commit_chain_layers(secret: &str, steps: u32) -> Result<Vec<HexValue>, SimulationError> {
    check_inputs(secret, steps)?;
    let layers = iter::successors(Some(sha3_hex(secret)), |h| Some(sha3_hex(&h.to_string())))
        .take(steps as usize)
        .collect();
    Ok(layers)
}

/// `hash^steps(secret)`
pub fn unroll_commit_chain(secret: &str, steps: u32) -> Result<HexValue, SimulationError> {
    commit_chain_layers(secret, steps)?
        .pop()
        .ok_or_else(|| SimulationError::invalid_input("RANDAO hash steps must be at least 1"))
}

/// Build the commitment a validator publishes at registration
pub fn commit(secret: &str, steps: u32) -> Result<RandaoCommitment, SimulationError> {
    let commitment = unroll_commit_chain(secret, steps)?;
    debug!(steps, %commitment, "RANDAO commitment");
    Ok(RandaoCommitment { commitment, steps })
}

/// Re-unroll `secret` and compare against `commitment`
pub fn verify_reveal(secret: &str, commitment: &RandaoCommitment) -> bool {
    commitment.verify(secret)
}

/// Whether `reveal` is the layer directly beneath `previous`
pub fn verify_layer(reveal: &HexValue, previous: &HexValue) -> bool {
    sha3_hex(&reveal.to_string()) == *previous
}

/// Chain layer revealed after `reveals_made` earlier reveals.
///
/// Layers `steps - 1` down to `1` are revealed in turn, then the walk
/// starts again from the top. A single-step chain can only ever reveal
/// its commitment.
pub fn reveal_layer(steps: u32, reveals_made: u32) -> u32 {
    if steps <= 1 {
        return steps;
    }
    let span = steps - 1;
    span - (reveals_made % span)
}

/// The reveal `validator` would publish next, without recording it
pub fn next_reveal(validator: &Validator) -> Result<HexValue, SimulationError> {
    let secret = validator.secret_phrase.as_deref().ok_or_else(|| {
        SimulationError::invalid_input(format!("validator {} holds no RANDAO secret", validator.id))
    })?;
    unroll_commit_chain(secret, reveal_layer(validator.hash_steps, validator.reveals_made))
}

/// Publish the next reveal of `validator` and record it
pub fn reveal(validator: &mut Validator) -> Result<HexValue, SimulationError> {
    let value = next_reveal(validator)?;
    validator.randao_reveal = value.clone();
    validator.reveals_made += 1;
    debug!(validator = validator.id, reveals = validator.reveals_made, reveal = %value, "RANDAO reveal");
    Ok(value)
}
