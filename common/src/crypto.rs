//! Hashing helpers for the simulated chain

use crate::hex_value::HexValue;
use sha3::{Digest, Sha3_256};

/// SHA3-256 of a UTF-8 string, as a 64-digit hex value.
///
/// The commit chain feeds the `0x`-prefixed text of one step into the
/// next, so this hashes text rather than decoded bytes.
pub fn sha3_hex(input: &str) -> HexValue {
    HexValue::from_bytes(&sha3_bytes(input.as_bytes()))
}

/// Raw SHA3-256 digest.
pub fn sha3_bytes(input: &[u8]) -> [u8; 32] {
    Sha3_256::digest(input).into()
}
