//! Staking simulator fork choice module
//! Validators bet on one of two competing blocks; the winning block is
//! finalized and the other discarded

pub mod error;
pub mod policy;
pub mod run;

pub use error::ForkChoiceError;
pub use policy::{Decision, ForkChoicePolicy, Intent, SeedOnlyPolicy, SupermajorityPolicy, TallyView};
pub use run::{seed_choice, BetStep, ForkChoiceRun, StepKind};

use anyhow::{bail, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use stakesim_common::{
    configuration::{check_probability, deserialize_fraction},
    rational_number::{RationalNumber, TWO_THIRDS},
    Block, ChainChoice, Ether, HexValue, Validator, ValidatorId, Vote,
};
use tracing::{info, info_span};

/// `[fork-choice]` configuration section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ForkChoiceParams {
    #[serde(deserialize_with = "deserialize_fraction")]
    pub supermajority: RationalNumber,
    pub abstain_probability: f64,
    pub min_odds: f64,
    pub max_odds: f64,
}

impl Default for ForkChoiceParams {
    fn default() -> Self {
        Self {
            supermajority: TWO_THIRDS,
            abstain_probability: 0.1,
            min_odds: 1.1,
            max_odds: 5.0,
        }
    }
}

impl ForkChoiceParams {
    pub fn validate(&self) -> Result<()> {
        check_probability("fork-choice abstain-probability", self.abstain_probability)?;
        if !(self.min_odds > 0.0 && self.min_odds <= self.max_odds && self.max_odds.is_finite()) {
            bail!(
                "fork-choice odds must satisfy 0 < min-odds <= max-odds, got {}..{}",
                self.min_odds,
                self.max_odds
            );
        }
        Ok(())
    }

    pub fn policy(&self) -> SupermajorityPolicy {
        SupermajorityPolicy {
            threshold: self.supermajority,
        }
    }
}

/// Outcome of a fork-choice round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkResult {
    pub finalized_chain: ChainChoice,
    pub votes: Vec<Vote>,
    pub proposed_stake: Ether,
    pub forked_stake: Ether,

    /// Validators that sat the round out
    #[serde(default)]
    pub abstained: Vec<ValidatorId>,

    /// Validators caught authoring both blocks
    #[serde(default)]
    pub slashed: Vec<ValidatorId>,

    /// Whether the finalized chain holds the configured supermajority
    pub supermajority: bool,
}

impl ForkResult {
    /// Share of voting stake behind the proposed block
    pub fn proposed_share(&self) -> f64 {
        let total = self.proposed_stake + self.forked_stake;
        if total > 0.0 {
            self.proposed_stake / total
        } else {
            0.0
        }
    }

    pub fn vote_of(&self, id: ValidatorId) -> Option<&Vote> {
        self.votes.iter().find(|v| v.validator_id == id)
    }
}

/// Resolve the fork under the supermajority policy from `params`.
///
/// Every successful result finalizes the proposed block with at least the
/// configured share of voting stake.
pub fn resolve_fork(
    validators: &[Validator],
    proposed: &Block,
    forked: &Block,
    global_seed: &HexValue,
    params: &ForkChoiceParams,
    rng: &mut dyn RngCore,
) -> Result<ForkResult, ForkChoiceError> {
    resolve_fork_with_policy(validators, proposed, forked, global_seed, params, &params.policy(), rng)
}

/// Resolve the fork under any policy
pub fn resolve_fork_with_policy(
    validators: &[Validator],
    proposed: &Block,
    forked: &Block,
    global_seed: &HexValue,
    params: &ForkChoiceParams,
    policy: &dyn ForkChoicePolicy,
    rng: &mut dyn RngCore,
) -> Result<ForkResult, ForkChoiceError> {
    let span = info_span!("fork_choice", block = proposed.block_number);
    let _entered = span.enter();

    let run = ForkChoiceRun::new(validators, proposed, forked, global_seed, params, policy, rng)?;
    let result = run.finish();

    info!(
        finalized = %result.finalized_chain,
        proposed_stake = result.proposed_stake,
        forked_stake = result.forked_stake,
        share = result.proposed_share(),
        votes = result.votes.len(),
        abstained = result.abstained.len(),
        "Fork resolved"
    );
    Ok(result)
}
