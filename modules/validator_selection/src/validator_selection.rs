//! Staking simulator validator selection module
//! Picks the block proposer with probability proportional to stake

use serde::Serialize;
use stakesim_common::{Ether, HexValue, SimulationError, Validator, ValidatorId};
use tracing::{debug, info};

/// Half-open slice `[start, end)` of the stake line owned by one validator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInterval {
    pub validator_id: ValidatorId,
    pub start: Ether,
    pub end: Ether,
}

impl StakeInterval {
    pub fn contains(&self, point: Ether) -> bool {
        self.start <= point && point < self.end
    }
}

/// Sum of all stakes, after checking the set can be sampled from
pub fn total_value_locked(validators: &[Validator]) -> Result<Ether, SimulationError> {
    if validators.is_empty() {
        return Err(SimulationError::EmptyValidatorSet);
    }
    if let Some(bad) = validators.iter().find(|v| !v.stake.is_finite() || v.stake < 0.0) {
        return Err(SimulationError::invalid_input(format!(
            "validator {} has invalid stake {}",
            bad.id, bad.stake
        )));
    }
    let tvl: Ether = validators.iter().map(|v| v.stake).sum();
    if tvl <= 0.0 {
        return Err(SimulationError::ZeroTvl);
    }
    Ok(tvl)
}

/// Cumulative stake intervals in list order
pub fn stake_intervals(validators: &[Validator]) -> Result<Vec<StakeInterval>, SimulationError> {
    total_value_locked(validators)?;
    let mut cumulative = 0.0;
    Ok(validators
        .iter()
        .map(|v| {
            let start = cumulative;
            cumulative += v.stake;
            StakeInterval {
                validator_id: v.id,
                start,
                end: cumulative,
            }
        })
        .collect())
}

/// `stake / TVL` for every validator
pub fn selection_probabilities(
    validators: &[Validator],
) -> Result<Vec<(ValidatorId, f64)>, SimulationError> {
    let tvl = total_value_locked(validators)?;
    Ok(validators.iter().map(|v| (v.id, v.stake / tvl)).collect())
}

/// Position in `validators` of the validator owning `seed`'s point on the
/// stake line
pub fn select_validator_index(
    validators: &[Validator],
    seed: &HexValue,
) -> Result<usize, SimulationError> {
    let intervals = stake_intervals(validators)?;
    let tvl = intervals.last().map_or(0.0, |i| i.end);
    let r = seed.unit_interval();
    let target = r * tvl;

    // r == 1.0, or rounding pushed the target onto the end of the line
    let index = intervals
        .iter()
        .position(|interval| interval.contains(target))
        .unwrap_or(intervals.len() - 1);

    debug!(r, target, tvl, index, "Stake-weighted draw");
    Ok(index)
}

/// Deterministically select one validator, weighted by stake
pub fn select_validator<'a>(
    validators: &'a [Validator],
    seed: &HexValue,
) -> Result<&'a Validator, SimulationError> {
    let index = select_validator_index(validators, seed)?;
    let selected = &validators[index];
    info!(validator = selected.id, stake = selected.stake, "Selected proposer");
    Ok(selected)
}
