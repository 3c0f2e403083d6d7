//! Staking simulator block producer module
//! Builds the proposed block and the competing block that forks it

pub mod transactions;

pub use transactions::generate_transactions;

use anyhow::{bail, Result};
use rand::{seq::IndexedRandom, RngCore};
use serde::Deserialize;
use stakesim_common::{
    crypto::sha3_bytes, Block, BlockHash, SimulationError, Transaction, Validator, ValidatorId,
};
use tracing::info;

/// `[block-producer]` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BlockParams {
    pub gas_limit: u64,
    pub min_transactions: usize,
    pub max_transactions: usize,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            gas_limit: 30_000_000,
            min_transactions: 5,
            max_transactions: 20,
        }
    }
}

impl BlockParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_transactions > self.max_transactions {
            bail!(
                "block-producer min-transactions {} exceeds max-transactions {}",
                self.min_transactions,
                self.max_transactions
            );
        }
        Ok(())
    }
}

fn block_hash(number: u64, timestamp: u64, parent: &BlockHash, state_root: &BlockHash, proposer: ValidatorId) -> BlockHash {
    BlockHash::new(sha3_bytes(format!("{number}{timestamp}{parent}{state_root}{proposer}").as_bytes()))
}

fn transactions_root(transactions: &[Transaction]) -> BlockHash {
    let joined: Vec<u8> = transactions.iter().flat_map(|tx| tx.hash.to_vec()).collect();
    BlockHash::new(sha3_bytes(&joined))
}

/// Block by `proposer` on top of `parent`, or at height zero without one.
/// `timestamp` is in seconds.
pub fn propose_block(
    proposer: &Validator,
    parent: Option<&Block>,
    transactions: Vec<Transaction>,
    timestamp: u64,
    params: &BlockParams,
    rng: &mut dyn RngCore,
) -> Block {
    let block_number = parent.map_or(0, |p| p.block_number + 1);
    let parent_hash = parent.map(|p| p.hash).unwrap_or_default();
    let state_root = BlockHash::random(&mut *rng);
    let gas_used = transactions.iter().map(|tx| tx.gas_used).sum();

    let block = Block {
        block_number,
        hash: block_hash(block_number, timestamp, &parent_hash, &state_root, proposer.id),
        parent_hash,
        state_root,
        transactions_root: transactions_root(&transactions),
        receipts_root: BlockHash::random(&mut *rng),
        fee_recipient: proposer.withdrawal_address,
        gas_used,
        gas_limit: params.gas_limit,
        timestamp,
        proposer: proposer.id,
        transactions,
    };
    info!(
        number = block.block_number,
        hash = %block.hash,
        proposer = block.proposer,
        transactions = block.transactions.len(),
        "Proposed block"
    );
    block
}

/// Competing block for the same slot and parent, authored by `author`
pub fn fork_block(proposed: &Block, author: &Validator, rng: &mut dyn RngCore) -> Block {
    let mut forked = proposed.clone();
    forked.proposer = author.id;
    forked.fee_recipient = author.withdrawal_address;
    loop {
        forked.state_root = BlockHash::random(&mut *rng);
        forked.hash = block_hash(
            forked.block_number,
            forked.timestamp,
            &forked.parent_hash,
            &forked.state_root,
            author.id,
        );
        if forked.hash != proposed.hash {
            break;
        }
    }
    info!(number = forked.block_number, hash = %forked.hash, author = author.id, "Forked block");
    forked
}

/// Pick the author of the competing block: any other active validator,
/// or the proposer itself when no other is left (double signing)
pub fn choose_fork_author<'a>(
    validators: &'a [Validator],
    proposer: ValidatorId,
    rng: &mut dyn RngCore,
) -> Result<&'a Validator, SimulationError> {
    let others: Vec<&Validator> =
        validators.iter().filter(|v| v.is_active() && v.id != proposer).collect();
    if let Some(author) = others.choose(&mut *rng) {
        return Ok(*author);
    }
    validators
        .iter()
        .find(|v| v.id == proposer && v.is_active())
        .ok_or(SimulationError::EmptyValidatorSet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use stakesim_test_utils::{block, transaction, validator, validators_with_stakes};

    #[test]
    fn proposed_block_sums_gas_and_pays_proposer() {
        let proposer = validator(3, 64.0);
        let parent = block(7, 1, 0, 1);
        let txs = vec![transaction(1, 0.1), transaction(2, 0.2)];
        let mut rng = StdRng::seed_from_u64(1);

        let b = propose_block(&proposer, Some(&parent), txs, 1_700_000_012, &BlockParams::default(), &mut rng);
        assert_eq!(b.block_number, 8);
        assert_eq!(b.parent_hash, parent.hash);
        assert_eq!(b.gas_used, 42_000);
        assert_eq!(b.fee_recipient, proposer.withdrawal_address);
        assert_eq!(b.proposer, 3);
    }

    #[test]
    fn first_block_has_zero_parent() {
        let b = propose_block(
            &validator(1, 32.0),
            None,
            Vec::new(),
            0,
            &BlockParams::default(),
            &mut StdRng::seed_from_u64(2),
        );
        assert_eq!(b.block_number, 0);
        assert_eq!(b.parent_hash, BlockHash::default());
    }

    #[test]
    fn fork_competes_with_proposed_block() {
        let mut rng = StdRng::seed_from_u64(3);
        let proposed = propose_block(&validator(1, 32.0), None, Vec::new(), 10, &BlockParams::default(), &mut rng);
        let forked = fork_block(&proposed, &validator(2, 32.0), &mut rng);
        assert!(proposed.conflicts_with(&forked));
        assert_eq!(forked.proposer, 2);

        let self_fork = fork_block(&proposed, &validator(1, 32.0), &mut rng);
        assert!(proposed.conflicts_with(&self_fork));
    }

    #[test]
    fn fork_author_differs_from_proposer() {
        let validators = validators_with_stakes(&[32.0, 32.0, 32.0]);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            assert_ne!(choose_fork_author(&validators, 2, &mut rng).unwrap().id, 2);
        }
    }

    #[test]
    fn lone_validator_forks_itself() {
        let mut validators = validators_with_stakes(&[32.0, 32.0]);
        validators[1].slashed = true;
        let author = choose_fork_author(&validators, 1, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(author.id, 1);
    }
}
