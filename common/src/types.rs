//! Definition of the simulated chain's data model

use crate::declare_hash_type;
use crate::hex_value::HexValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validator identifier, unique within a set and assigned in increasing order
pub type ValidatorId = u64;

/// ETH-denominated amount
pub type Ether = f64;

declare_hash_type!(BlockHash, 32);
declare_hash_type!(TxHash, 32);
declare_hash_type!(
    /// Withdrawal / fee-recipient address. Opaque in this simulation.
    Address,
    20
);

/// A staking validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validator {
    /// Identifier
    pub id: ValidatorId,

    /// Staked balance
    pub stake: Ether,

    /// Opaque withdrawal address
    pub withdrawal_address: Address,

    /// `hash^hash_steps(secret)`, published at registration
    pub randao_commitment: HexValue,

    /// Most recently revealed layer of the commit chain; equal to the
    /// commitment until the first reveal
    pub randao_reveal: HexValue,

    /// Length of the commit chain
    pub hash_steps: u32,

    /// Layers revealed so far
    #[serde(default)]
    pub reveals_made: u32,

    /// Secret behind the commitment. Held in the clear because every
    /// participant is simulated locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_phrase: Option<String>,

    /// Set once the validator has been caught double-signing
    #[serde(default)]
    pub slashed: bool,
}

impl Validator {
    /// Whether this validator may still take part in rounds
    pub fn is_active(&self) -> bool {
        !self.slashed
    }
}

/// Mock transaction carried by a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,

    /// Transferred value
    pub value: Ether,

    /// Priority fee paid to the proposer, in ETH
    pub fee: Ether,

    pub gas_used: u64,

    /// Unix time in milliseconds
    pub timestamp: u64,
}

/// Block being voted on
///
/// Only `hash`, `parent_hash` and `proposer` take part in fork choice;
/// the remaining fields are narrative payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_number: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub state_root: BlockHash,
    pub transactions_root: BlockHash,
    pub receipts_root: BlockHash,
    pub fee_recipient: Address,
    pub gas_used: u64,
    pub gas_limit: u64,

    /// Unix time in seconds
    pub timestamp: u64,

    /// Validator that authored this block
    pub proposer: ValidatorId,

    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Whether `other` competes with this block for the same slot
    pub fn conflicts_with(&self, other: &Block) -> bool {
        self.block_number == other.block_number
            && self.parent_hash == other.parent_hash
            && self.hash != other.hash
    }

    /// Sum of priority fees carried by the block
    pub fn priority_fees(&self) -> Ether {
        self.transactions.iter().map(|tx| tx.fee).sum()
    }
}

/// Which branch of a fork a validator backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainChoice {
    Proposed,
    Forked,
}

impl ChainChoice {
    pub fn other(self) -> Self {
        match self {
            ChainChoice::Proposed => ChainChoice::Forked,
            ChainChoice::Forked => ChainChoice::Proposed,
        }
    }
}

impl fmt::Display for ChainChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainChoice::Proposed => write!(f, "proposed"),
            ChainChoice::Forked => write!(f, "forked"),
        }
    }
}

/// A validator's finality bet, alive for one fork-choice round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub validator_id: ValidatorId,
    pub chosen_chain: ChainChoice,

    /// Betting odds, `>= 1.1` when drawn by the simulator
    pub odds: f64,

    /// Stake behind the vote at the time it was cast
    pub stake_weight: Ether,
}
