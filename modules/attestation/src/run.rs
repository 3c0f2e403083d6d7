//! Step-by-step attestation

use crate::policy::{AttestationPolicy, AttestationProgress, DecisionReason};
use rand::RngCore;
use serde::Serialize;
use stakesim_common::{Validator, ValidatorId};
use tracing::debug;

/// One committee member's attestation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationDecision {
    pub validator_id: ValidatorId,
    pub approved: bool,
    pub reason: DecisionReason,
}

/// Yields one decision per validator, in committee order
pub struct AttestationRun<'a> {
    validators: &'a [Validator],
    policy: &'a dyn AttestationPolicy,
    rng: &'a mut dyn RngCore,
    required: usize,
    approved: usize,
    next: usize,
}

impl<'a> AttestationRun<'a> {
    pub fn new(
        validators: &'a [Validator],
        required: usize,
        policy: &'a dyn AttestationPolicy,
        rng: &'a mut dyn RngCore,
    ) -> Self {
        Self {
            validators,
            policy,
            rng,
            required,
            approved: 0,
            next: 0,
        }
    }

    /// Approvals needed for quorum
    pub fn required(&self) -> usize {
        self.required
    }

    /// Approvals so far
    pub fn approved(&self) -> usize {
        self.approved
    }
}

impl Iterator for AttestationRun<'_> {
    type Item = AttestationDecision;

    fn next(&mut self) -> Option<Self::Item> {
        let validator = self.validators.get(self.next)?;
        let progress = AttestationProgress {
            approved: self.approved,
            decided: self.next,
            total: self.validators.len(),
            required: self.required,
        };
        let verdict = self.policy.decide(&progress, &mut *self.rng);
        if verdict.approved {
            self.approved += 1;
        }
        self.next += 1;

        debug!(validator = validator.id, approved = verdict.approved, reason = ?verdict.reason, "Attestation");
        Some(AttestationDecision {
            validator_id: validator.id,
            approved: verdict.approved,
            reason: verdict.reason,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.validators.len() - self.next;
        (left, Some(left))
    }
}
