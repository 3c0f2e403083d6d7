//! Mock transaction generation

use crate::BlockParams;
use rand::{Rng, RngCore};
use stakesim_common::{Address, Ether, Transaction, TxHash};

const GWEI_IN_ETH: f64 = 1e-9;
const MIN_GAS: u64 = 21_000;
const MAX_GAS: u64 = 100_000;

/// Random transfers for one block. `timestamp_ms` is stamped on each.
pub fn generate_transactions(
    rng: &mut dyn RngCore,
    params: &BlockParams,
    timestamp_ms: u64,
) -> Vec<Transaction> {
    let count = rng.random_range(params.min_transactions..=params.max_transactions);
    (0..count).map(|_| random_transaction(&mut *rng, timestamp_ms)).collect()
}

fn random_transaction(rng: &mut dyn RngCore, timestamp_ms: u64) -> Transaction {
    let gas_used = rng.random_range(MIN_GAS..MAX_GAS);
    let priority_gwei: f64 = rng.random_range(0.1..2.0);
    let value: Ether = rng.random_range(0.01..10.0);
    Transaction {
        hash: TxHash::random(&mut *rng),
        from: Address::random(&mut *rng),
        to: Address::random(&mut *rng),
        value,
        fee: priority_gwei * gas_used as f64 * GWEI_IN_ETH,
        gas_used,
        timestamp: timestamp_ms,
    }
}
