//! Approval policies for committee attestation

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use stakesim_common::{configuration::check_probability, SimulationError};

/// Tally seen by the policy before deciding the current validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationProgress {
    /// Approvals so far
    pub approved: usize,
    /// Validators already decided, excluding the current one
    pub decided: usize,
    /// Committee size
    pub total: usize,
    /// Approvals needed for quorum
    pub required: usize,
}

impl AttestationProgress {
    /// Undecided validators after the current one
    pub fn remaining_after_current(&self) -> usize {
        self.total.saturating_sub(self.decided + 1)
    }

    pub fn quorum_reached(&self) -> bool {
        self.approved >= self.required
    }
}

/// Why a validator approved or rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    /// Rejecting would have made quorum unreachable
    Forced,
    /// Quorum already held, free coin flip
    PostQuorum,
    /// Biased draw while quorum was still open
    Biased,
    /// Draw with no regard to the tally
    Independent,
}

/// Outcome for one validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub approved: bool,
    pub reason: DecisionReason,
}

/// Strategy deciding each committee member's approval
pub trait AttestationPolicy {
    fn decide(&self, progress: &AttestationProgress, rng: &mut dyn RngCore) -> Verdict;

    /// Reject parameters `decide` cannot draw with
    fn validate(&self) -> Result<(), SimulationError> {
        Ok(())
    }
}

fn probability(name: &str, p: f64) -> Result<(), SimulationError> {
    check_probability(name, p).map_err(|e| SimulationError::invalid_input(e.to_string()))
}

/// Approves with a bias until quorum holds, and never lets quorum become
/// unreachable. Every committee therefore reaches quorum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimisticQuorumPolicy {
    pub bias: f64,
    pub post_quorum_probability: f64,
}

impl Default for OptimisticQuorumPolicy {
    fn default() -> Self {
        Self {
            bias: 0.75,
            post_quorum_probability: 0.5,
        }
    }
}

impl AttestationPolicy for OptimisticQuorumPolicy {
    fn decide(&self, progress: &AttestationProgress, rng: &mut dyn RngCore) -> Verdict {
        if progress.approved + progress.remaining_after_current() < progress.required {
            Verdict {
                approved: true,
                reason: DecisionReason::Forced,
            }
        } else if progress.quorum_reached() {
            Verdict {
                approved: rng.random_bool(self.post_quorum_probability),
                reason: DecisionReason::PostQuorum,
            }
        } else {
            Verdict {
                approved: rng.random_bool(self.bias),
                reason: DecisionReason::Biased,
            }
        }
    }

    fn validate(&self) -> Result<(), SimulationError> {
        probability("attestation bias", self.bias)?;
        probability("attestation post-quorum-probability", self.post_quorum_probability)
    }
}

/// Every validator approves independently with a fixed probability.
/// Quorum is not guaranteed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndependentPolicy {
    pub probability: f64,
}

impl AttestationPolicy for IndependentPolicy {
    fn decide(&self, _progress: &AttestationProgress, rng: &mut dyn RngCore) -> Verdict {
        Verdict {
            approved: rng.random_bool(self.probability),
            reason: DecisionReason::Independent,
        }
    }

    fn validate(&self) -> Result<(), SimulationError> {
        probability("attestation probability", self.probability)
    }
}
