//! Error taxonomy shared by every simulation stage

use crate::hex_value::HexValueError;
use thiserror::Error;

/// Failures raised by the core operations.
///
/// Core functions fail fast with one of these rather than substituting
/// random or default data for a missing precondition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Malformed or missing required parameter.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Selection attempted on an empty validator set.
    #[error("Validator set is empty")]
    EmptyValidatorSet,

    /// Selection attempted on a validator set with no stake.
    #[error("Total value locked is zero")]
    ZeroTvl,

    /// Odds outside the `(0, ∞)` domain of the logarithm.
    #[error("Invalid odds {odds}: must be greater than zero")]
    InvalidOdds { odds: f64 },

    /// A required upstream value was absent from, or unreadable in, the store.
    #[error("Missing persisted state '{key}': {reason}")]
    MissingPersistedState { key: String, reason: String },
}

impl SimulationError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        SimulationError::InvalidInput(message.into())
    }

    pub fn missing_state(key: &str, reason: impl Into<String>) -> Self {
        SimulationError::MissingPersistedState {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<HexValueError> for SimulationError {
    fn from(error: HexValueError) -> Self {
        SimulationError::InvalidInput(error.to_string())
    }
}
