//! Staking simulator RANDAO module
//! Commit-reveal randomness beacon feeding proposer selection

pub mod accumulator;
pub mod commit_chain;

pub use accumulator::{combine_with_global, MixPolicy, RandaoAccumulator};
pub use commit_chain::{
    commit, commit_chain_layers, next_reveal, reveal, unroll_commit_chain, verify_layer,
    verify_reveal, RandaoCommitment,
};

use serde::Deserialize;
use stakesim_common::{HexValue, SimulationError, Validator, ValidatorId};
use tracing::{info, info_span};

/// `[randao]` configuration section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RandaoParams {
    pub mix_policy: MixPolicy,
}

/// Have each listed validator reveal its next layer, in order, and mix
/// the reveals into `global_seed`. Returns the new seed.
///
/// Inactive validators are skipped; an unknown id is an error.
pub fn mix_reveals(
    validators: &mut [Validator],
    revealers: &[ValidatorId],
    global_seed: &HexValue,
    params: &RandaoParams,
) -> Result<HexValue, SimulationError> {
    let span = info_span!("randao", policy = %params.mix_policy);
    let _entered = span.enter();

    let mut accumulator = RandaoAccumulator::new(global_seed.clone(), params.mix_policy);
    for id in revealers {
        let validator = validators
            .iter_mut()
            .find(|v| v.id == *id)
            .ok_or_else(|| SimulationError::invalid_input(format!("unknown revealer {id}")))?;
        if !validator.is_active() {
            continue;
        }
        let value = reveal(validator)?;
        accumulator.contribute(*id, &value);
    }

    info!(
        contributors = accumulator.contributors().len(),
        seed = %accumulator.seed(),
        "Mixed global seed"
    );
    Ok(accumulator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakesim_test_utils::validators_with_stakes;

    fn onion(mut v: Validator, steps: u32) -> Validator {
        let secret = format!("onion-{}", v.id);
        v.hash_steps = steps;
        v.randao_commitment = unroll_commit_chain(&secret, steps).unwrap();
        v.randao_reveal = v.randao_commitment.clone();
        v.secret_phrase = Some(secret);
        v
    }

    fn seed() -> HexValue {
        format!("0x{}", "5a".repeat(32)).parse().unwrap()
    }

    #[test]
    fn accumulate_mixes_all_revealers() {
        let mut validators: Vec<_> =
            validators_with_stakes(&[32.0, 64.0]).into_iter().map(|v| onion(v, 5)).collect();
        let expected = seed()
            .xor(&next_reveal(&validators[0]).unwrap())
            .xor(&next_reveal(&validators[1]).unwrap());

        let mixed = mix_reveals(&mut validators, &[1, 2], &seed(), &RandaoParams::default()).unwrap();
        assert_eq!(mixed, expected);
        assert!(validators.iter().all(|v| v.reveals_made == 1));
    }

    #[test]
    fn last_revealer_only_counts_final_reveal() {
        let mut validators: Vec<_> =
            validators_with_stakes(&[32.0, 64.0]).into_iter().map(|v| onion(v, 5)).collect();
        let expected = seed().xor(&next_reveal(&validators[1]).unwrap());
        let params = RandaoParams {
            mix_policy: MixPolicy::LastRevealer,
        };
        assert_eq!(mix_reveals(&mut validators, &[1, 2], &seed(), &params).unwrap(), expected);
    }

    #[test]
    fn successive_rounds_do_not_cycle_back() {
        let mut validators = vec![onion(validators_with_stakes(&[32.0]).remove(0), 6)];
        let params = RandaoParams::default();
        let first = mix_reveals(&mut validators, &[1], &seed(), &params).unwrap();
        let second = mix_reveals(&mut validators, &[1], &first, &params).unwrap();
        assert_ne!(second, seed());
        assert_ne!(second, first);
    }

    #[test]
    fn slashed_validators_do_not_reveal() {
        let mut validators = validators_with_stakes(&[32.0, 32.0]);
        validators[0].slashed = true;
        let mixed = mix_reveals(&mut validators, &[1], &seed(), &RandaoParams::default()).unwrap();
        assert_eq!(mixed, seed());
        assert_eq!(validators[0].reveals_made, 0);
    }

    #[test]
    fn unknown_revealer_is_rejected() {
        let mut validators = validators_with_stakes(&[32.0]);
        assert!(mix_reveals(&mut validators, &[9], &seed(), &RandaoParams::default()).is_err());
    }
}
