use crate::rational_number::{parse_fraction, RationalNumber};
use anyhow::{anyhow, Result};
use config::{Config, ConfigError};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use std::fmt::{self, Display, Formatter};

pub const CONFIG_KEY_STARTUP_MODE: &str = "startup.mode";

/// Where the simulator takes its initial state from
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupMode {
    /// Generate a fresh validator set and seed
    #[default]
    Genesis,
    /// Resume from whatever the store already holds
    Store,
}

impl StartupMode {
    /// `Genesis` when unset; an unrecognised mode is an error
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.get::<StartupMode>(CONFIG_KEY_STARTUP_MODE) {
            Ok(mode) => Ok(mode),
            Err(ConfigError::NotFound(_)) => Ok(StartupMode::Genesis),
            Err(e) => Err(anyhow!("Invalid configuration '{CONFIG_KEY_STARTUP_MODE}': {e}")),
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, StartupMode::Genesis)
    }

    pub fn is_store(&self) -> bool {
        matches!(self, StartupMode::Store)
    }
}

impl Display for StartupMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StartupMode::Genesis => write!(f, "genesis"),
            StartupMode::Store => write!(f, "store"),
        }
    }
}

/// Read a configuration section, falling back to `T::default()` when the
/// section is absent. A present but malformed section is an error.
pub fn section_or_default<T: DeserializeOwned + Default>(config: &Config, key: &str) -> Result<T> {
    match config.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => Err(anyhow!("Invalid configuration '{key}': {e}")),
    }
}

/// Deserialise a fraction written as `"n/d"`.
pub fn deserialize_fraction<'de, D>(deserializer: D) -> Result<RationalNumber, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_fraction(&s).map_err(serde::de::Error::custom)
}

/// Reject a probability outside `[0, 1]`.
pub fn check_probability(name: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(anyhow!("{name} must be a probability in [0, 1], got {p}"))
    }
}
