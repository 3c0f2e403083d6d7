//! Shared fixtures for module tests

use stakesim_common::{
    crypto::sha3_hex, Address, Block, BlockHash, Ether, Transaction, TxHash, Validator,
    ValidatorId,
};

/// Secret used by [`validator`] for the given id
pub fn secret_for(id: ValidatorId) -> String {
    format!("secret-{id}")
}

/// Active validator with a single-step commit chain over [`secret_for`]
pub fn validator(id: ValidatorId, stake: Ether) -> Validator {
    let secret = secret_for(id);
    let commitment = sha3_hex(&secret);
    Validator {
        id,
        stake,
        withdrawal_address: Address::new([id as u8; 20]),
        randao_commitment: commitment.clone(),
        randao_reveal: commitment,
        hash_steps: 1,
        reveals_made: 0,
        secret_phrase: Some(secret),
        slashed: false,
    }
}

/// Like [`validator`], but committed to a chain of `steps` hashes
pub fn multi_step_validator(id: ValidatorId, stake: Ether, steps: u32) -> Validator {
    let mut validator = validator(id, stake);
    let commitment = (1..steps).fold(validator.randao_commitment.clone(), |h, _| {
        sha3_hex(&h.to_string())
    });
    validator.hash_steps = steps.max(1);
    validator.randao_commitment = commitment.clone();
    validator.randao_reveal = commitment;
    validator
}

/// Validators with ids `1..=n` and the given stakes
pub fn validators_with_stakes(stakes: &[Ether]) -> Vec<Validator> {
    stakes.iter().enumerate().map(|(i, stake)| validator(i as ValidatorId + 1, *stake)).collect()
}

/// `n` validators holding 32 ETH each
pub fn uniform_validators(n: usize) -> Vec<Validator> {
    validators_with_stakes(&vec![32.0; n])
}

/// Hash with every byte set to `n`
pub fn hash(n: u8) -> BlockHash {
    BlockHash::new([n; 32])
}

/// Empty block at `number` on top of `parent`
pub fn block(number: u64, hash_byte: u8, parent_byte: u8, proposer: ValidatorId) -> Block {
    Block {
        block_number: number,
        hash: hash(hash_byte),
        parent_hash: hash(parent_byte),
        state_root: BlockHash::default(),
        transactions_root: BlockHash::default(),
        receipts_root: BlockHash::default(),
        fee_recipient: Address::new([proposer as u8; 20]),
        gas_used: 0,
        gas_limit: 30_000_000,
        timestamp: 1_700_000_000,
        proposer,
        transactions: Vec::new(),
    }
}

/// Transaction paying `fee` to the proposer
pub fn transaction(n: u8, fee: Ether) -> Transaction {
    Transaction {
        hash: TxHash::new([n; 32]),
        from: Address::new([n; 20]),
        to: Address::new([n.wrapping_add(1); 20]),
        value: 1.0,
        fee,
        gas_used: 21_000,
        timestamp: 1_700_000_000_000,
    }
}
