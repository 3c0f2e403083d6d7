//! Step-by-step finality betting

use crate::error::ForkChoiceError;
use crate::policy::{Decision, ForkChoicePolicy, Intent, TallyView};
use crate::{ForkChoiceParams, ForkResult};
use rand::{Rng, RngCore};
use serde::Serialize;
use stakesim_common::{
    rational_number::meets_fraction, Block, ChainChoice, Ether, HexValue, SimulationError,
    Validator, ValidatorId, Vote,
};
use tracing::debug;

/// How a validator's step came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// Author of one of the blocks; allegiance fixed
    Fixed,
    /// Chain taken from the seed parity
    Seeded,
    /// Seed choice or abstention overruled by the policy
    Overridden,
    Abstained,
    /// Slashed, inactive, or caught double-signing
    Excluded,
}

/// One validator's contribution to the round
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetStep {
    pub validator_id: ValidatorId,
    pub kind: StepKind,
    pub vote: Option<Vote>,
}

/// Parity of `global_seed XOR reveal` picks the chain
pub fn seed_choice(global_seed: &HexValue, reveal: &HexValue) -> ChainChoice {
    if global_seed.xor(reveal).is_even() {
        ChainChoice::Proposed
    } else {
        ChainChoice::Forked
    }
}

/// Yields one [`BetStep`] per validator, in list order
pub struct ForkChoiceRun<'a> {
    validators: &'a [Validator],
    global_seed: &'a HexValue,
    params: &'a ForkChoiceParams,
    policy: &'a dyn ForkChoicePolicy,
    rng: &'a mut dyn RngCore,
    proposer: ValidatorId,
    fork_author: ValidatorId,
    proposed_stake: Ether,
    forked_stake: Ether,
    remaining: Ether,
    next: usize,
    votes: Vec<Vote>,
    abstained: Vec<ValidatorId>,
}

impl<'a> ForkChoiceRun<'a> {
    pub fn new(
        validators: &'a [Validator],
        proposed: &Block,
        forked: &Block,
        global_seed: &'a HexValue,
        params: &'a ForkChoiceParams,
        policy: &'a dyn ForkChoicePolicy,
        rng: &'a mut dyn RngCore,
    ) -> Result<Self, ForkChoiceError> {
        params.validate().map_err(|e| SimulationError::invalid_input(e.to_string()))?;
        if validators.is_empty() {
            return Err(SimulationError::EmptyValidatorSet.into());
        }
        if !proposed.conflicts_with(forked) {
            return Err(ForkChoiceError::NotConflicting {
                proposed: proposed.hash,
                forked: forked.hash,
            });
        }

        let stake_of = |id: ValidatorId| {
            validators
                .iter()
                .find(|v| v.id == id)
                .map(|v| if v.is_active() { v.stake } else { 0.0 })
                .ok_or(ForkChoiceError::UnknownAuthor { id })
        };
        let proposer = proposed.proposer;
        let fork_author = forked.proposer;
        let (proposed_stake, forked_stake) = if proposer == fork_author {
            stake_of(proposer)?;
            (0.0, 0.0)
        } else {
            (stake_of(proposer)?, stake_of(fork_author)?)
        };

        let mut run = Self {
            validators,
            global_seed,
            params,
            policy,
            rng,
            proposer,
            fork_author,
            proposed_stake,
            forked_stake,
            remaining: 0.0,
            next: 0,
            votes: Vec::new(),
            abstained: Vec::new(),
        };
        let remaining: Ether =
            validators.iter().filter(|v| run.is_deciding(v)).map(|v| v.stake).sum();
        run.remaining = remaining;
        run.check_feasible()?;
        Ok(run)
    }

    fn is_double_signer(&self, id: ValidatorId) -> bool {
        self.proposer == self.fork_author && id == self.proposer
    }

    fn is_deciding(&self, validator: &Validator) -> bool {
        validator.is_active() && validator.id != self.proposer && validator.id != self.fork_author
    }

    fn check_feasible(&self) -> Result<(), ForkChoiceError> {
        let best_proposed = self.proposed_stake + self.remaining;
        let total = best_proposed + self.forked_stake;
        if total <= 0.0 {
            return Err(SimulationError::ZeroTvl.into());
        }
        if let Some(required) = self.policy.guaranteed_share() {
            if !meets_fraction(best_proposed, self.forked_stake, &required) {
                return Err(ForkChoiceError::SupermajorityUnreachable {
                    achievable: best_proposed / total,
                    required,
                });
            }
        }
        Ok(())
    }

    fn draw_odds(&mut self) -> f64 {
        self.rng.random_range(self.params.min_odds..=self.params.max_odds)
    }

    fn cast(&mut self, validator: &Validator, chain: ChainChoice) -> Vote {
        let vote = Vote {
            validator_id: validator.id,
            chosen_chain: chain,
            odds: self.draw_odds(),
            stake_weight: validator.stake,
        };
        self.votes.push(vote.clone());
        vote
    }

    fn step(&mut self, validator: &'a Validator) -> BetStep {
        let id = validator.id;
        if !validator.is_active() || self.is_double_signer(id) {
            return BetStep {
                validator_id: id,
                kind: StepKind::Excluded,
                vote: None,
            };
        }
        if id == self.proposer || id == self.fork_author {
            let chain =
                if id == self.proposer { ChainChoice::Proposed } else { ChainChoice::Forked };
            return BetStep {
                validator_id: id,
                kind: StepKind::Fixed,
                vote: Some(self.cast(validator, chain)),
            };
        }

        let abstains = self.rng.random_bool(self.params.abstain_probability);
        let intent = if abstains {
            Intent::Abstain
        } else {
            Intent::Vote(seed_choice(self.global_seed, &validator.randao_reveal))
        };
        self.remaining = (self.remaining - validator.stake).max(0.0);
        let tally = TallyView {
            proposed_stake: self.proposed_stake,
            forked_stake: self.forked_stake,
            remaining_after: self.remaining,
            stake: validator.stake,
        };

        match self.policy.decide(&tally, intent) {
            Decision::Abstain => {
                self.abstained.push(id);
                BetStep {
                    validator_id: id,
                    kind: StepKind::Abstained,
                    vote: None,
                }
            }
            Decision::Vote { chain, overridden } => {
                match chain {
                    ChainChoice::Proposed => self.proposed_stake += validator.stake,
                    ChainChoice::Forked => self.forked_stake += validator.stake,
                }
                let kind = if overridden { StepKind::Overridden } else { StepKind::Seeded };
                BetStep {
                    validator_id: id,
                    kind,
                    vote: Some(self.cast(validator, chain)),
                }
            }
        }
    }

    pub fn proposed_stake(&self) -> Ether {
        self.proposed_stake
    }

    pub fn forked_stake(&self) -> Ether {
        self.forked_stake
    }

    /// Run any remaining steps and tally the outcome
    pub fn finish(mut self) -> ForkResult {
        self.by_ref().for_each(drop);

        let finalized_chain = if self.proposed_stake >= self.forked_stake {
            ChainChoice::Proposed
        } else {
            ChainChoice::Forked
        };
        let (winner, loser) = match finalized_chain {
            ChainChoice::Proposed => (self.proposed_stake, self.forked_stake),
            ChainChoice::Forked => (self.forked_stake, self.proposed_stake),
        };
        let slashed = if self.proposer == self.fork_author { vec![self.proposer] } else { vec![] };

        ForkResult {
            finalized_chain,
            supermajority: meets_fraction(winner, loser, &self.params.supermajority),
            votes: self.votes,
            proposed_stake: self.proposed_stake,
            forked_stake: self.forked_stake,
            abstained: self.abstained,
            slashed,
        }
    }
}

impl Iterator for ForkChoiceRun<'_> {
    type Item = BetStep;

    fn next(&mut self) -> Option<Self::Item> {
        let validators = self.validators;
        let validator = validators.get(self.next)?;
        self.next += 1;
        let step = self.step(validator);
        debug!(
            validator = step.validator_id,
            kind = ?step.kind,
            chain = ?step.vote.as_ref().map(|v| v.chosen_chain),
            proposed = self.proposed_stake,
            forked = self.forked_stake,
            "Finality bet"
        );
        Some(step)
    }
}
