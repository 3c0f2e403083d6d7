use anyhow::{anyhow, Result};

pub type RationalNumber = num_rational::Ratio<u64>;

/// The two-thirds supermajority used by attestation and finality.
pub const TWO_THIRDS: RationalNumber = RationalNumber::new_raw(2, 3);

/// Parse "n/d" (or a bare integer) into a fraction in `(0, 1]`.
pub fn parse_fraction(s: &str) -> Result<RationalNumber> {
    let (numer, denom) = match s.split_once('/') {
        Some((n, d)) => (n.trim().parse::<u64>()?, d.trim().parse::<u64>()?),
        None => (s.trim().parse::<u64>()?, 1),
    };
    if denom == 0 || numer == 0 || numer > denom {
        return Err(anyhow!("Fraction {s} must lie in (0, 1]"));
    }
    Ok(RationalNumber::new(numer, denom))
}

/// Smallest count `k` with `k / n >= fraction`, i.e. `ceil(fraction * n)`.
///
/// Computed in `u128`; a fraction in `(0, 1]` never yields more than `n`.
pub fn ceil_fraction_of(fraction: &RationalNumber, n: usize) -> usize {
    let numer = u128::from(*fraction.numer());
    let denom = u128::from(*fraction.denom());
    let k = (numer * n as u128).div_ceil(denom);
    usize::try_from(k).unwrap_or(usize::MAX)
}

/// Whether `part` makes up at least `fraction` of `part + rest`.
///
/// Cross-multiplied so integral stakes compare exactly.
pub fn meets_fraction(part: f64, rest: f64, fraction: &RationalNumber) -> bool {
    part * (*fraction.denom() as f64) >= (part + rest) * (*fraction.numer() as f64)
}
