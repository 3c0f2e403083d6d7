//! Staking simulator rewards module
//! Settles finality bets and applies penalties, slashing and proposer
//! rewards to validator stakes

pub mod fees;
pub mod slashing;

pub use fees::{fee_breakdown, pay_proposer, proposer_reward, FeeBreakdown, ProposerReward};
pub use slashing::{inactivity_penalty, slashing_penalty};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use stakesim_common::{ChainChoice, Ether, SimulationError, Validator, ValidatorId};
use stakesim_module_fork_choice::ForkResult;
use tracing::{info, info_span, warn};

/// `[rewards]` configuration section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RewardParams {
    pub finality_reward_coefficient: f64,
    /// Seconds
    pub block_time: f64,
    /// Reference TVL used in reward scaling
    pub total_validating_ether: Ether,
    pub bet_coefficient: f64,
    pub proposal_reward_multiplier: f64,
    pub slashing_multiplier: f64,
    pub inactivity_penalty_multiplier: f64,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            finality_reward_coefficient: 6e-10,
            block_time: 4.0,
            total_validating_ether: 4045.0,
            bet_coefficient: 1.0,
            proposal_reward_multiplier: 1000.0,
            slashing_multiplier: 2000.0,
            inactivity_penalty_multiplier: 500.0,
        }
    }
}

impl RewardParams {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("finality-reward-coefficient", self.finality_reward_coefficient),
            ("block-time", self.block_time),
            ("total-validating-ether", self.total_validating_ether),
            ("bet-coefficient", self.bet_coefficient),
            ("proposal-reward-multiplier", self.proposal_reward_multiplier),
            ("slashing-multiplier", self.slashing_multiplier),
            ("inactivity-penalty-multiplier", self.inactivity_penalty_multiplier),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                bail!("rewards {name} must be a non-negative number, got {value}");
            }
        }
        Ok(())
    }
}

/// `FRC × block time × total validating ether`
pub fn base_reward(params: &RewardParams) -> Ether {
    params.finality_reward_coefficient * params.block_time * params.total_validating_ether
}

fn check_odds(odds: f64) -> Result<(), SimulationError> {
    if odds > 0.0 && odds.is_finite() {
        Ok(())
    } else {
        Err(SimulationError::InvalidOdds { odds })
    }
}

/// Amount lost when a bet at `odds` backs the losing chain
pub fn potential_loss(params: &RewardParams, odds: f64, stake: Ether) -> Result<Ether, SimulationError> {
    check_odds(odds)?;
    Ok(base_reward(params) * odds * params.bet_coefficient * stake)
}

/// Amount won when a bet at `odds` backs the finalized chain
pub fn potential_gain(params: &RewardParams, odds: f64, stake: Ether) -> Result<Ether, SimulationError> {
    check_odds(odds)?;
    Ok(base_reward(params) * odds.ln() * params.bet_coefficient * stake)
}

/// Cause of a stake change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StakeChangeKind {
    BetWon,
    BetLost,
    Inactivity,
    Slashing,
}

/// Signed change applied to one validator's stake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeChange {
    pub validator_id: ValidatorId,
    pub kind: StakeChangeKind,
    pub delta: Ether,
}

/// A settled finality bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetOutcome {
    pub validator_id: ValidatorId,
    pub chosen_chain: ChainChoice,
    pub odds: f64,
    pub potential_gain: Ether,
    pub potential_loss: Ether,
    pub won: bool,
}

/// Updated validator set and the changes that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub validators: Vec<Validator>,
    pub bets: Vec<BetOutcome>,
    pub changes: Vec<StakeChange>,
}

impl Settlement {
    /// Net stake change of one validator
    pub fn delta_of(&self, id: ValidatorId) -> Ether {
        self.changes.iter().filter(|c| c.validator_id == id).map(|c| c.delta).sum()
    }
}

struct Ledger {
    validators: Vec<Validator>,
    changes: Vec<StakeChange>,
}

impl Ledger {
    fn apply(&mut self, id: ValidatorId, kind: StakeChangeKind, delta: Ether) -> Result<(), SimulationError> {
        let validator = self.validators.iter_mut().find(|v| v.id == id).ok_or_else(|| {
            SimulationError::invalid_input(format!("validator {id} is not in the validator set"))
        })?;
        let before = validator.stake;
        let applied = if before + delta < 0.0 {
            warn!(validator = id, delta, stake = before, "Stake exhausted");
            -before
        } else {
            delta
        };
        validator.stake = before + applied;
        self.changes.push(StakeChange {
            validator_id: id,
            kind,
            delta: applied,
        });
        Ok(())
    }
}

/// Settle every bet of `result`, then penalise abstainers and slash
/// double-signers. Stakes never go below zero.
pub fn settle_rewards(
    validators: &[Validator],
    result: &ForkResult,
    params: &RewardParams,
) -> Result<Settlement, SimulationError> {
    let span = info_span!("rewards", finalized = %result.finalized_chain);
    let _entered = span.enter();

    let mut ledger = Ledger {
        validators: validators.to_vec(),
        changes: Vec::new(),
    };
    let mut bets = Vec::with_capacity(result.votes.len());

    for vote in &result.votes {
        let gain = potential_gain(params, vote.odds, vote.stake_weight)?;
        let loss = potential_loss(params, vote.odds, vote.stake_weight)?;
        let won = vote.chosen_chain == result.finalized_chain;
        if won {
            ledger.apply(vote.validator_id, StakeChangeKind::BetWon, gain)?;
        } else {
            ledger.apply(vote.validator_id, StakeChangeKind::BetLost, -loss)?;
        }
        bets.push(BetOutcome {
            validator_id: vote.validator_id,
            chosen_chain: vote.chosen_chain,
            odds: vote.odds,
            potential_gain: gain,
            potential_loss: loss,
            won,
        });
    }

    // Penalties are charged on the stake held going into the round
    let stake_before =
        |id: ValidatorId| validators.iter().find(|v| v.id == id).map_or(0.0, |v| v.stake);

    for id in &result.abstained {
        let penalty = inactivity_penalty(params, stake_before(*id));
        ledger.apply(*id, StakeChangeKind::Inactivity, -penalty)?;
    }

    for id in &result.slashed {
        let penalty = slashing_penalty(params, stake_before(*id));
        ledger.apply(*id, StakeChangeKind::Slashing, -penalty)?;
        if let Some(validator) = ledger.validators.iter_mut().find(|v| v.id == *id) {
            validator.slashed = true;
        }
        warn!(validator = id, penalty, "Slashed for double signing");
    }

    info!(
        bets = bets.len(),
        won = bets.iter().filter(|b| b.won).count(),
        abstained = result.abstained.len(),
        slashed = result.slashed.len(),
        "Rewards settled"
    );
    Ok(Settlement {
        validators: ledger.validators,
        bets,
        changes: ledger.changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use stakesim_common::Vote;
    use stakesim_test_utils::validators_with_stakes;
    use test_case::test_case;

    fn result_with(votes: Vec<Vote>) -> ForkResult {
        ForkResult {
            finalized_chain: ChainChoice::Proposed,
            votes,
            proposed_stake: 0.0,
            forked_stake: 0.0,
            abstained: Vec::new(),
            slashed: Vec::new(),
            supermajority: true,
        }
    }

    fn vote(id: ValidatorId, chain: ChainChoice, odds: f64, stake: Ether) -> Vote {
        Vote {
            validator_id: id,
            chosen_chain: chain,
            odds,
            stake_weight: stake,
        }
    }

    #[derive(Debug, Clone)]
    struct Bets(Vec<(ChainChoice, f64, f64)>);

    impl Arbitrary for Bets {
        fn arbitrary(g: &mut Gen) -> Self {
            let n = usize::arbitrary(g) % 20 + 1;
            Bets(
                (0..n)
                    .map(|_| {
                        let chain = if bool::arbitrary(g) { ChainChoice::Proposed } else { ChainChoice::Forked };
                        let odds = 1.1 + f64::from(u16::arbitrary(g) % 3901) / 1000.0;
                        let stake = f64::from(u16::arbitrary(g) % 1000 + 32);
                        (chain, odds, stake)
                    })
                    .collect(),
            )
        }
    }

    #[quickcheck]
    fn winners_gain_and_losers_lose_exactly(bets: Bets) -> bool {
        let stakes: Vec<f64> = bets.0.iter().map(|b| b.2).collect();
        let validators = validators_with_stakes(&stakes);
        let votes = bets
            .0
            .iter()
            .zip(&validators)
            .map(|((chain, odds, stake), v)| vote(v.id, *chain, *odds, *stake))
            .collect();
        let params = RewardParams::default();
        let settlement = settle_rewards(&validators, &result_with(votes), &params).unwrap();

        bets.0.iter().zip(&validators).all(|((chain, odds, stake), v)| {
            let delta = settlement.delta_of(v.id);
            if *chain == ChainChoice::Proposed {
                delta > 0.0
            } else {
                delta == -potential_loss(&params, *odds, *stake).unwrap()
            }
        })
    }

    #[test]
    fn formulas_match_worked_example() {
        let params = RewardParams::default();
        let base = 6e-10 * 4.0 * 4045.0;
        assert_eq!(base_reward(&params), base);
        assert_eq!(potential_loss(&params, 2.0, 32.0).unwrap(), base * 2.0 * 1.0 * 32.0);
        assert_eq!(potential_gain(&params, 2.0, 32.0).unwrap(), base * 2f64.ln() * 1.0 * 32.0);
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(-1.5 ; "negative")]
    #[test_case(f64::NAN ; "nan")]
    fn non_positive_odds_rejected(odds: f64) {
        let params = RewardParams::default();
        assert!(matches!(
            potential_gain(&params, odds, 32.0),
            Err(SimulationError::InvalidOdds { .. })
        ));
        let validators = validators_with_stakes(&[32.0]);
        let result = result_with(vec![vote(1, ChainChoice::Proposed, odds, 32.0)]);
        assert!(settle_rewards(&validators, &result, &params).is_err());
    }

    #[test]
    fn double_signer_is_slashed() {
        let params = RewardParams::default();
        let validators = validators_with_stakes(&[1000.0, 500.0]);
        let mut result = result_with(vec![vote(2, ChainChoice::Proposed, 2.0, 500.0)]);
        result.slashed = vec![1];

        let settlement = settle_rewards(&validators, &result, &params).unwrap();
        let slashed = &settlement.validators[0];
        assert!(slashed.slashed);
        assert_eq!(slashed.stake, 1000.0 - 1000.0 * 6e-10 * 2000.0);
        assert!(!settlement.validators[1].slashed);
    }

    #[test]
    fn slashing_adds_to_betting_loss() {
        let params = RewardParams::default();
        let validators = validators_with_stakes(&[1000.0]);
        let mut result = result_with(vec![vote(1, ChainChoice::Forked, 3.0, 1000.0)]);
        result.slashed = vec![1];

        let settlement = settle_rewards(&validators, &result, &params).unwrap();
        let loss = potential_loss(&params, 3.0, 1000.0).unwrap();
        let expected = 1000.0 - loss - slashing_penalty(&params, 1000.0);
        assert_eq!(settlement.validators[0].stake, expected);
        assert_eq!(settlement.changes.len(), 2);
        assert_eq!(settlement.changes[1].delta, -slashing_penalty(&params, 1000.0));
    }

    #[test]
    fn abstainers_pay_inactivity_penalty() {
        let params = RewardParams::default();
        let validators = validators_with_stakes(&[32.0, 64.0]);
        let mut result = result_with(Vec::new());
        result.abstained = vec![2];

        let settlement = settle_rewards(&validators, &result, &params).unwrap();
        assert_eq!(settlement.delta_of(2), -inactivity_penalty(&params, 64.0));
        assert_eq!(settlement.delta_of(1), 0.0);
    }

    #[test]
    fn stake_never_goes_negative() {
        let params = RewardParams {
            finality_reward_coefficient: 1.0,
            ..RewardParams::default()
        };
        let validators = validators_with_stakes(&[32.0]);
        let result = result_with(vec![vote(1, ChainChoice::Forked, 5.0, 32.0)]);
        let settlement = settle_rewards(&validators, &result, &params).unwrap();
        assert_eq!(settlement.validators[0].stake, 0.0);
        assert_eq!(settlement.delta_of(1), -32.0);
    }

    #[test]
    fn negative_coefficients_rejected() {
        let params = RewardParams {
            bet_coefficient: -1.0,
            ..RewardParams::default()
        };
        assert!(params.validate().is_err());
    }
}
