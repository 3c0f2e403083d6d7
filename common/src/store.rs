//! Persisted-state collaborator.
//!
//! Stands in for browser local storage: a flat, process-wide string
//! key-value store with no transactional guarantees. [`SimulationStore`]
//! puts a typed schema on top so records are never parsed ad hoc.

use crate::error::SimulationError;
use crate::hex_value::HexValue;
use crate::types::{Block, Validator, ValidatorId};
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Well-known keys
pub mod keys {
    pub const VALIDATORS: &str = "validators";
    pub const GLOBAL_SEED: &str = "globalRandao";
    pub const SELECTED_VALIDATOR: &str = "selectedValidatorID";
    pub const PROPOSED_BLOCK: &str = "proposedBlock";
    pub const FORKED_BLOCK: &str = "competingForkData";
    pub const ATTESTATION: &str = "blockAggregationData";
    pub const BETTING_RESULTS: &str = "bettingResults";
    pub const CHAIN: &str = "singleChain";
}

/// Narrow key-value interface
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// Volatile in-process store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, written through on
/// every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the file at `path`, starting empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Store {} is not a JSON object of strings", path.display()))?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), "Opened store");
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, text)
            .with_context(|| format!("Failed to write store {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.flush()
    }
}

/// Typed view over a [`KeyValueStore`]
///
/// Reads fail with [`SimulationError::MissingPersistedState`] when a value
/// is absent or does not parse; nothing is defaulted.
pub struct SimulationStore<S: KeyValueStore> {
    inner: S,
}

impl<S: KeyValueStore> SimulationStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Load and decode a JSON record
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T, SimulationError> {
        let raw = self
            .inner
            .get(key)
            .ok_or_else(|| SimulationError::missing_state(key, "not yet initialised"))?;
        serde_json::from_str(&raw)
            .map_err(|e| SimulationError::missing_state(key, format!("malformed value: {e}")))
    }

    /// Encode and store a JSON record
    pub fn save<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialise '{key}'"))?;
        self.inner.set(key, raw)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.get(key).is_some()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.inner.clear()
    }

    pub fn validators(&self) -> Result<Vec<Validator>, SimulationError> {
        let validators: Vec<Validator> = self.load(keys::VALIDATORS)?;
        if validators.is_empty() {
            return Err(SimulationError::missing_state(keys::VALIDATORS, "validator set is empty"));
        }
        Ok(validators)
    }

    pub fn set_validators(&mut self, validators: &[Validator]) -> Result<()> {
        self.save(keys::VALIDATORS, &validators)
    }

    /// The global seed is stored as a bare string, not JSON
    pub fn global_seed(&self) -> Result<HexValue, SimulationError> {
        let raw = self
            .inner
            .get(keys::GLOBAL_SEED)
            .ok_or_else(|| SimulationError::missing_state(keys::GLOBAL_SEED, "not yet initialised"))?;
        raw.parse()
            .map_err(|e| SimulationError::missing_state(keys::GLOBAL_SEED, format!("malformed value: {e}")))
    }

    pub fn set_global_seed(&mut self, seed: &HexValue) -> Result<()> {
        self.inner.set(keys::GLOBAL_SEED, seed.to_string())
    }

    pub fn selected_validator(&self) -> Result<ValidatorId, SimulationError> {
        self.load(keys::SELECTED_VALIDATOR)
    }

    pub fn set_selected_validator(&mut self, id: ValidatorId) -> Result<()> {
        self.save(keys::SELECTED_VALIDATOR, &id)
    }

    pub fn proposed_block(&self) -> Result<Block, SimulationError> {
        self.load(keys::PROPOSED_BLOCK)
    }

    pub fn set_proposed_block(&mut self, block: &Block) -> Result<()> {
        self.save(keys::PROPOSED_BLOCK, block)
    }

    pub fn forked_block(&self) -> Result<Block, SimulationError> {
        self.load(keys::FORKED_BLOCK)
    }

    pub fn set_forked_block(&mut self, block: &Block) -> Result<()> {
        self.save(keys::FORKED_BLOCK, block)
    }

    /// Finalized chain so far; empty before the first round
    pub fn chain(&self) -> Result<Vec<Block>, SimulationError> {
        if !self.contains(keys::CHAIN) {
            return Ok(Vec::new());
        }
        self.load(keys::CHAIN)
    }

    pub fn set_chain(&mut self, chain: &[Block]) -> Result<()> {
        self.save(keys::CHAIN, &chain)
    }
}
