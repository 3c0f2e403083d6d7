//! Policies shaping each validator's finality bet

use stakesim_common::{
    rational_number::{meets_fraction, RationalNumber, TWO_THIRDS},
    ChainChoice, Ether,
};

/// Running tally at the point a validator decides
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TallyView {
    pub proposed_stake: Ether,
    pub forked_stake: Ether,
    /// Stake of deciding validators still to come after this one
    pub remaining_after: Ether,
    /// Stake of the validator deciding now
    pub stake: Ether,
}

/// What the validator would do left to itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Vote(ChainChoice),
    Abstain,
}

/// What the validator ends up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Vote {
        chain: ChainChoice,
        overridden: bool,
    },
    Abstain,
}

/// Strategy applied to every deciding validator
pub trait ForkChoicePolicy {
    fn decide(&self, tally: &TallyView, intent: Intent) -> Decision;

    /// Share of voting stake the proposed chain is guaranteed to end
    /// with, if the policy enforces one
    fn guaranteed_share(&self) -> Option<RationalNumber> {
        None
    }
}

/// Keeps the proposed chain at or above `threshold` of voting stake.
///
/// The invariant carried from validator to validator is that the proposed
/// chain would still meet the threshold if every remaining validator
/// backed it. A forked vote is accepted only if the threshold holds with
/// it counted now; an abstention only if the invariant survives it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupermajorityPolicy {
    pub threshold: RationalNumber,
}

impl Default for SupermajorityPolicy {
    fn default() -> Self {
        Self {
            threshold: TWO_THIRDS,
        }
    }
}

impl SupermajorityPolicy {
    fn forced(&self) -> Decision {
        Decision::Vote {
            chain: ChainChoice::Proposed,
            overridden: true,
        }
    }
}

impl ForkChoicePolicy for SupermajorityPolicy {
    fn decide(&self, tally: &TallyView, intent: Intent) -> Decision {
        let TallyView {
            proposed_stake: p,
            forked_stake: f,
            remaining_after: rest,
            stake,
        } = *tally;
        match intent {
            Intent::Vote(ChainChoice::Proposed) => Decision::Vote {
                chain: ChainChoice::Proposed,
                overridden: false,
            },
            Intent::Vote(ChainChoice::Forked) => {
                if meets_fraction(p, f + stake, &self.threshold) {
                    Decision::Vote {
                        chain: ChainChoice::Forked,
                        overridden: false,
                    }
                } else {
                    self.forced()
                }
            }
            Intent::Abstain => {
                if meets_fraction(p + rest, f, &self.threshold) && p + f + rest > 0.0 {
                    Decision::Abstain
                } else {
                    self.forced()
                }
            }
        }
    }

    fn guaranteed_share(&self) -> Option<RationalNumber> {
        Some(self.threshold)
    }
}

/// Takes every seed-derived choice and abstention as drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedOnlyPolicy;

impl ForkChoicePolicy for SeedOnlyPolicy {
    fn decide(&self, _tally: &TallyView, intent: Intent) -> Decision {
        match intent {
            Intent::Vote(chain) => Decision::Vote {
                chain,
                overridden: false,
            },
            Intent::Abstain => Decision::Abstain,
        }
    }
}
