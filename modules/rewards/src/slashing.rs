//! Penalties outside the betting game

use crate::RewardParams;
use stakesim_common::Ether;

/// One-off deduction for authoring both sides of a fork
pub fn slashing_penalty(params: &RewardParams, stake: Ether) -> Ether {
    stake * params.finality_reward_coefficient * params.slashing_multiplier
}

/// Deduction for sitting out a finality round
pub fn inactivity_penalty(params: &RewardParams, stake: Ether) -> Ether {
    stake * params.finality_reward_coefficient * params.inactivity_penalty_multiplier
}
