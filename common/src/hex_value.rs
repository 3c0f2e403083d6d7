//! Variable-length hexadecimal values used by the randomness beacon.
//!
//! RANDAO reveals, commitments and the global seed are handled as hex
//! strings of arbitrary length: stored values may come from an external
//! store and need not be exactly 32 bytes, so combination pads on the left
//! instead of rejecting mismatched lengths.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Number of hex digits in a 256-bit value.
const DIGITS_256: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexValueError {
    #[error("hex value is empty")]
    Empty,

    #[error("invalid hex digit '{digit}' at position {position}")]
    InvalidDigit { digit: char, position: usize },
}

/// Hash-shaped hexadecimal value.
///
/// Holds lowercase digits without the `0x` prefix; leading zeros are
/// significant and preserved, since the digit count is the value's
/// "length" for XOR padding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HexValue(String);

impl HexValue {
    /// Hex-encode raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Digits without prefix.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Number of hex digits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    /// Parity of the integer value, read from the last digit.
    pub fn is_even(&self) -> bool {
        self.nibbles().last().is_none_or(|n| n % 2 == 0)
    }

    /// Digit-wise XOR. The shorter operand is left-padded with zeros, so
    /// the result has as many digits as the longer one.
    pub fn xor(&self, other: &HexValue) -> HexValue {
        let width = self.len().max(other.len());
        let a = self.padded(width);
        let b = other.padded(width);
        let digits = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| char::from_digit(u32::from(x ^ y), 16).unwrap_or('0'))
            .collect();
        HexValue(digits)
    }

    /// Maps the value onto the unit interval as
    /// `(value mod 2^256) / (2^256 - 1)`.
    ///
    /// In `f64`, `2^256 - 1` rounds to `2^256`, so the result only reaches
    /// `1.0` for values within rounding distance of the maximum; callers
    /// must treat `1.0` as a boundary case.
    pub fn unit_interval(&self) -> f64 {
        let nibbles = self.nibbles();
        let start = nibbles.len().saturating_sub(DIGITS_256);
        let value = nibbles[start..].iter().fold(0f64, |acc, n| acc * 16.0 + f64::from(*n));
        (value / 2f64.powi(256)).min(1.0)
    }

    fn nibbles(&self) -> Vec<u8> {
        self.0.chars().filter_map(|c| c.to_digit(16)).map(|d| d as u8).collect()
    }

    fn padded(&self, width: usize) -> Vec<u8> {
        let mut nibbles = vec![0u8; width.saturating_sub(self.len())];
        nibbles.extend(self.nibbles());
        nibbles
    }
}

impl FromStr for HexValue {
    type Err = HexValueError;

    /// Parses `0x`-prefixed or bare hex; digits are normalised to lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if digits.is_empty() {
            return Err(HexValueError::Empty);
        }
        if let Some((position, digit)) = digits.chars().enumerate().find(|(_, c)| !c.is_ascii_hexdigit()) {
            return Err(HexValueError::InvalidDigit { digit, position });
        }
        Ok(Self(digits.to_ascii_lowercase()))
    }
}

impl fmt::Display for HexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.0)
    }
}

impl fmt::Debug for HexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HexValue").field(&self.to_string()).finish()
    }
}

impl<const BYTES: usize> From<crate::hash::Hash<BYTES>> for HexValue {
    fn from(hash: crate::hash::Hash<BYTES>) -> Self {
        Self::from_bytes(hash.as_ref())
    }
}

impl Serialize for HexValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HexValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
