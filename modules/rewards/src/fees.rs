//! Proposer rewards and transaction fee split

use crate::RewardParams;
use serde::Serialize;
use stakesim_common::{Block, Ether, SimulationError, Validator, ValidatorId};
use tracing::info;

const WEI_PER_ETH: f64 = 1e18;

pub fn wei_to_eth(wei: f64) -> Ether {
    wei / WEI_PER_ETH
}

/// Reward earned by the author of the finalized block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposerReward {
    pub validator_id: ValidatorId,
    pub base: Ether,
    pub priority_fees: Ether,
    pub total: Ether,
}

/// `FRC × proposal multiplier × block time × total validating ether`
pub fn proposal_base_reward(params: &RewardParams) -> Ether {
    params.finality_reward_coefficient
        * params.proposal_reward_multiplier
        * params.block_time
        * params.total_validating_ether
}

pub fn proposer_reward(params: &RewardParams, block: &Block) -> ProposerReward {
    let base = proposal_base_reward(params);
    let priority_fees = block.priority_fees();
    ProposerReward {
        validator_id: block.proposer,
        base,
        priority_fees,
        total: base + priority_fees,
    }
}

/// Credit the block's proposer with its reward
pub fn pay_proposer(
    validators: &mut [Validator],
    block: &Block,
    params: &RewardParams,
) -> Result<ProposerReward, SimulationError> {
    let reward = proposer_reward(params, block);
    let proposer = validators.iter_mut().find(|v| v.id == block.proposer).ok_or_else(|| {
        SimulationError::invalid_input(format!("proposer {} is not in the validator set", block.proposer))
    })?;
    proposer.stake += reward.total;
    info!(
        validator = proposer.id,
        base = reward.base,
        priority_fees = reward.priority_fees,
        "Paid proposer reward"
    );
    Ok(reward)
}

/// Fee split for one transaction, in wei
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    /// Burned
    pub base_fee: f64,
    /// Paid to the fee recipient
    pub tip: f64,
    pub total: f64,
}

impl FeeBreakdown {
    pub fn burned(&self) -> f64 {
        self.base_fee
    }

    pub fn to_fee_recipient(&self) -> f64 {
        self.tip
    }
}

pub fn fee_breakdown(
    base_fee_per_gas: f64,
    priority_fee_per_gas: f64,
    gas_limit: u64,
) -> Result<FeeBreakdown, SimulationError> {
    if priority_fee_per_gas < 0.0 || !priority_fee_per_gas.is_finite() {
        return Err(SimulationError::invalid_input("priority fee cannot be negative"));
    }
    if base_fee_per_gas < 0.0 || !base_fee_per_gas.is_finite() {
        return Err(SimulationError::invalid_input("base fee cannot be negative"));
    }
    let gas = gas_limit as f64;
    let base_fee = base_fee_per_gas * gas;
    let tip = priority_fee_per_gas * gas;
    Ok(FeeBreakdown {
        base_fee,
        tip,
        total: base_fee + tip,
    })
}
