//! Staking simulator attestation module
//! Committee votes on the proposed block until a quorum holds

pub mod policy;
pub mod run;

pub use policy::{
    AttestationPolicy, AttestationProgress, DecisionReason, IndependentPolicy,
    OptimisticQuorumPolicy, Verdict,
};
pub use run::{AttestationDecision, AttestationRun};

use anyhow::{bail, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use stakesim_common::{
    configuration::{check_probability, deserialize_fraction},
    rational_number::{ceil_fraction_of, RationalNumber, TWO_THIRDS},
    SimulationError, Validator,
};
use tracing::{info, info_span};

const DEFAULT_COMMITTEE_SIZE: usize = 15;

/// `[attestation]` configuration section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AttestationParams {
    #[serde(deserialize_with = "deserialize_fraction")]
    pub quorum: RationalNumber,
    pub committee_size: usize,
    pub bias: f64,
    pub post_quorum_probability: f64,
}

impl Default for AttestationParams {
    fn default() -> Self {
        let policy = OptimisticQuorumPolicy::default();
        Self {
            quorum: TWO_THIRDS,
            committee_size: DEFAULT_COMMITTEE_SIZE,
            bias: policy.bias,
            post_quorum_probability: policy.post_quorum_probability,
        }
    }
}

impl AttestationParams {
    pub fn validate(&self) -> Result<()> {
        check_probability("attestation bias", self.bias)?;
        check_probability("attestation post-quorum-probability", self.post_quorum_probability)?;
        if self.committee_size == 0 {
            bail!("attestation committee-size must be at least 1");
        }
        Ok(())
    }

    pub fn policy(&self) -> OptimisticQuorumPolicy {
        OptimisticQuorumPolicy {
            bias: self.bias,
            post_quorum_probability: self.post_quorum_probability,
        }
    }
}

/// Split of the committee after attestation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResult {
    pub approved: Vec<Validator>,
    pub rejected: Vec<Validator>,
    pub quorum_reached: bool,
}

impl AttestationResult {
    pub fn committee_size(&self) -> usize {
        self.approved.len() + self.rejected.len()
    }
}

/// The first `size` active validators, in list order
pub fn select_committee(validators: &[Validator], size: usize) -> Vec<Validator> {
    validators.iter().filter(|v| v.is_active()).take(size).cloned().collect()
}

/// Attest with the optimistic policy configured in `params`
pub fn run_attestation(
    validators: &[Validator],
    params: &AttestationParams,
    rng: &mut dyn RngCore,
) -> Result<AttestationResult, SimulationError> {
    run_attestation_with_policy(validators, &params.quorum, &params.policy(), rng)
}

/// Attest with any policy; `quorum_reached` is reported, not guaranteed
pub fn run_attestation_with_policy(
    validators: &[Validator],
    quorum: &RationalNumber,
    policy: &dyn AttestationPolicy,
    rng: &mut dyn RngCore,
) -> Result<AttestationResult, SimulationError> {
    policy.validate()?;
    if validators.is_empty() {
        return Err(SimulationError::EmptyValidatorSet);
    }
    let span = info_span!("attestation", committee = validators.len());
    let _entered = span.enter();

    let required = ceil_fraction_of(quorum, validators.len());
    let mut approved = Vec::new();
    let mut rejected = Vec::new();
    for (validator, decision) in
        validators.iter().zip(AttestationRun::new(validators, required, policy, rng))
    {
        if decision.approved {
            approved.push(validator.clone());
        } else {
            rejected.push(validator.clone());
        }
    }

    let quorum_reached = approved.len() >= required;
    info!(
        approved = approved.len(),
        rejected = rejected.len(),
        required,
        quorum_reached,
        "Attestation complete"
    );
    Ok(AttestationResult {
        approved,
        rejected,
        quorum_reached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use rand::{rngs::StdRng, SeedableRng};
    use stakesim_test_utils::uniform_validators;
    use test_case::test_case;

    #[quickcheck]
    fn optimistic_policy_always_reaches_quorum(size: u8, seed: u64) -> bool {
        let n = usize::from(size % 64) + 1;
        let validators = uniform_validators(n);
        let mut rng = StdRng::seed_from_u64(seed);
        let result = run_attestation(&validators, &AttestationParams::default(), &mut rng).unwrap();
        result.quorum_reached
            && result.approved.len() >= ceil_fraction_of(&TWO_THIRDS, n)
            && result.committee_size() == n
    }

    #[test]
    fn hostile_bias_is_overridden() {
        let params = AttestationParams {
            bias: 0.0,
            post_quorum_probability: 0.0,
            ..AttestationParams::default()
        };
        let validators = uniform_validators(15);
        let result =
            run_attestation(&validators, &params, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(result.approved.len(), 10);
        // Rejections come first, then every remaining validator is forced
        assert!(result.rejected.iter().all(|v| v.id <= 5));
    }

    #[test]
    fn independent_policy_can_miss_quorum() {
        let validators = uniform_validators(6);
        let result = run_attestation_with_policy(
            &validators,
            &TWO_THIRDS,
            &IndependentPolicy { probability: 0.0 },
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        assert!(!result.quorum_reached);
        assert_eq!(result.rejected.len(), 6);
    }

    #[test]
    fn iterator_reports_forced_decisions() {
        let validators = uniform_validators(3);
        let policy = OptimisticQuorumPolicy {
            bias: 0.0,
            post_quorum_probability: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(9);
        let reasons: Vec<_> =
            AttestationRun::new(&validators, 2, &policy, &mut rng).map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![DecisionReason::Biased, DecisionReason::Forced, DecisionReason::Forced]
        );
    }

    #[test]
    fn empty_committee_is_rejected() {
        let result =
            run_attestation(&[], &AttestationParams::default(), &mut StdRng::seed_from_u64(0));
        assert_eq!(result, Err(SimulationError::EmptyValidatorSet));
    }

    #[test]
    fn committee_skips_slashed_validators() {
        let mut validators = uniform_validators(5);
        validators[1].slashed = true;
        let committee = select_committee(&validators, 3);
        let ids: Vec<_> = committee.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn params_validation() {
        assert!(AttestationParams::default().validate().is_ok());
        let bad = AttestationParams {
            bias: 1.2,
            ..AttestationParams::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test_case(AttestationParams { bias: 1.5, ..AttestationParams::default() } ; "bias above one")]
    #[test_case(AttestationParams { post_quorum_probability: -0.5, ..AttestationParams::default() } ; "negative post-quorum probability")]
    #[test_case(AttestationParams { bias: f64::NAN, ..AttestationParams::default() } ; "bias not a number")]
    fn bad_params_are_invalid_input(params: AttestationParams) {
        let result = run_attestation(&uniform_validators(9), &params, &mut StdRng::seed_from_u64(2));
        assert!(matches!(result, Err(SimulationError::InvalidInput(_))));
    }

    #[test]
    fn independent_policy_probability_is_checked() {
        let policy = IndependentPolicy { probability: 2.0 };
        let mut rng = StdRng::seed_from_u64(2);
        let result =
            run_attestation_with_policy(&uniform_validators(3), &TWO_THIRDS, &policy, &mut rng);
        assert!(matches!(result, Err(SimulationError::InvalidInput(_))));
    }
}
