//! Folding reveals into the shared seed

use serde::{Deserialize, Serialize};
use stakesim_common::{HexValue, ValidatorId};
use std::fmt;

/// How a round's reveals enter the global seed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MixPolicy {
    /// XOR every reveal of the round into the seed
    #[default]
    Accumulate,

    /// Only the most recent reveal is XORed with the round's starting
    /// seed; earlier reveals are overwritten
    LastRevealer,
}

impl fmt::Display for MixPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixPolicy::Accumulate => write!(f, "accumulate"),
            MixPolicy::LastRevealer => write!(f, "last-revealer"),
        }
    }
}

/// XOR two hash-shaped values, left-padding the shorter
pub fn combine_with_global(reveal: &HexValue, global_seed: &HexValue) -> HexValue {
    reveal.xor(global_seed)
}

/// Seed being mixed during one round
#[derive(Debug, Clone)]
pub struct RandaoAccumulator {
    policy: MixPolicy,
    base: HexValue,
    mix: HexValue,
    contributors: Vec<ValidatorId>,
}

impl RandaoAccumulator {
    pub fn new(global_seed: HexValue, policy: MixPolicy) -> Self {
        Self {
            policy,
            mix: global_seed.clone(),
            base: global_seed,
            contributors: Vec::new(),
        }
    }

    pub fn contribute(&mut self, validator: ValidatorId, reveal: &HexValue) {
        self.mix = match self.policy {
            MixPolicy::Accumulate => combine_with_global(reveal, &self.mix),
            MixPolicy::LastRevealer => combine_with_global(reveal, &self.base),
        };
        self.contributors.push(validator);
    }

    /// Validators that revealed this round, in order
    pub fn contributors(&self) -> &[ValidatorId] {
        &self.contributors
    }

    pub fn policy(&self) -> MixPolicy {
        self.policy
    }

    /// Current mixed value
    pub fn seed(&self) -> &HexValue {
        &self.mix
    }

    pub fn finish(self) -> HexValue {
        self.mix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[derive(Debug, Clone)]
    struct Seed(HexValue);

    impl Arbitrary for Seed {
        fn arbitrary(g: &mut Gen) -> Self {
            let bytes: Vec<u8> = (0..32).map(|_| u8::arbitrary(g)).collect();
            Seed(HexValue::from_bytes(&bytes))
        }
    }

    fn hv(s: &str) -> HexValue {
        s.parse().unwrap()
    }

    #[quickcheck]
    fn combination_is_symmetric(a: Seed, b: Seed) -> bool {
        combine_with_global(&a.0, &b.0) == combine_with_global(&b.0, &a.0)
    }

    #[quickcheck]
    fn combining_with_itself_is_zero(a: Seed) -> bool {
        let z = combine_with_global(&a.0, &a.0);
        z.is_zero() && z.len() == 64
    }

    #[test]
    fn unequal_lengths_are_left_padded() {
        assert_eq!(combine_with_global(&hv("0x1"), &hv("0xf0f0")), hv("0xf0f1"));
    }

    #[test]
    fn accumulate_folds_every_reveal() {
        let mut acc = RandaoAccumulator::new(hv("0x00ff"), MixPolicy::Accumulate);
        acc.contribute(1, &hv("0x0f00"));
        acc.contribute(2, &hv("0x000f"));
        assert_eq!(acc.contributors(), &[1, 2]);
        assert_eq!(acc.finish(), hv("0x0ff0"));
    }

    #[test]
    fn last_revealer_overwrites_earlier_reveals() {
        let mut acc = RandaoAccumulator::new(hv("0x00ff"), MixPolicy::LastRevealer);
        acc.contribute(1, &hv("0x0f00"));
        acc.contribute(2, &hv("0x000f"));
        assert_eq!(acc.finish(), hv("0x00f0"));
    }

    #[test]
    fn no_reveals_keeps_the_seed() {
        let acc = RandaoAccumulator::new(hv("0xabcd"), MixPolicy::Accumulate);
        assert_eq!(acc.seed(), &hv("0xabcd"));
    }

    #[test]
    fn policy_names() {
        assert_eq!(MixPolicy::LastRevealer.to_string(), "last-revealer");
        assert_eq!(MixPolicy::default(), MixPolicy::Accumulate);
    }
}
