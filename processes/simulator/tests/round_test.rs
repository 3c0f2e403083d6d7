use rand::{rngs::StdRng, SeedableRng};
use stakesim_common::{
    store::{keys, JsonFileStore, KeyValueStore, MemoryStore, SimulationStore},
    ChainChoice, HexValue, SimulationError, Validator,
};
use stakesim_module_fork_choice::ForkChoiceError;
use stakesim_simulator::{bootstrap_store, run_rounds, Round, SimulatorConfig};
use stakesim_test_utils::{multi_step_validator, uniform_validators};
use std::collections::HashSet;

const START: u64 = 1_700_000_000;

fn store_with(validators: &[Validator]) -> SimulationStore<MemoryStore> {
    let mut store = SimulationStore::new(MemoryStore::new());
    store.set_validators(validators).unwrap();
    store.set_global_seed(&HexValue::from_bytes(&[0x5a; 32])).unwrap();
    store
}

fn seeded_store(validators: usize) -> SimulationStore<MemoryStore> {
    store_with(&uniform_validators(validators))
}

fn missing_key(err: &anyhow::Error) -> Option<&str> {
    match err.downcast_ref::<SimulationError>() {
        Some(SimulationError::MissingPersistedState { key, .. }) => Some(key),
        _ => None,
    }
}

#[test]
fn round_writes_every_record() {
    let mut store = seeded_store(6);
    let config = SimulatorConfig::default();
    let round = Round::run(&mut store, &config, &mut StdRng::seed_from_u64(1), START).unwrap();

    for key in [
        keys::VALIDATORS,
        keys::GLOBAL_SEED,
        keys::SELECTED_VALIDATOR,
        keys::PROPOSED_BLOCK,
        keys::FORKED_BLOCK,
        keys::ATTESTATION,
        keys::BETTING_RESULTS,
        keys::CHAIN,
    ] {
        assert!(store.contains(key), "missing {key}");
    }

    assert_eq!(store.global_seed().unwrap(), round.global_seed);
    assert_eq!(store.selected_validator().unwrap(), round.proposer);
    assert_eq!(store.proposed_block().unwrap(), round.proposed);
    assert_eq!(store.forked_block().unwrap(), round.forked);
    assert_eq!(store.validators().unwrap(), round.validators);
    assert_eq!(store.chain().unwrap(), vec![round.finalized().clone()]);
}

#[test]
fn round_finalizes_proposed_block_with_supermajority() {
    let mut store = seeded_store(9);
    let config = SimulatorConfig::default();
    let round = Round::run(&mut store, &config, &mut StdRng::seed_from_u64(2), START).unwrap();

    assert!(round.attestation.quorum_reached);
    assert!(round.proposed.conflicts_with(&round.forked));
    assert_eq!(round.proposed.proposer, round.proposer);
    assert_eq!(round.fork.finalized_chain, ChainChoice::Proposed);
    assert!(round.fork.supermajority);
    assert!(round.fork.proposed_share() >= 2.0 / 3.0);

    let reward = round.proposer_reward.as_ref().unwrap();
    assert_eq!(reward.validator_id, round.proposer);
    assert!(reward.total > 0.0);
}

#[test]
fn reveals_move_the_seed() {
    let mut store = seeded_store(4);
    let before = store.global_seed().unwrap();
    let round =
        Round::run(&mut store, &SimulatorConfig::default(), &mut StdRng::seed_from_u64(3), START)
            .unwrap();
    assert_ne!(round.global_seed, before);
    assert!(round.validators.iter().all(|v| v.reveals_made == 1));
}

#[test]
fn seeds_stay_distinct_across_rounds() {
    // Chains of 2 to 10 steps; the 2-step one reveals the same layer every round
    let validators: Vec<_> =
        (1..=9).map(|id| multi_step_validator(id, 32.0, id as u32 + 1)).collect();
    let mut store = store_with(&validators);
    let genesis_seed = store.global_seed().unwrap();

    let rounds = run_rounds(
        &mut store,
        &SimulatorConfig::default(),
        &mut StdRng::seed_from_u64(10),
        10,
        START,
    )
    .unwrap();

    let mut seen = HashSet::from([genesis_seed]);
    for round in &rounds {
        assert!(seen.insert(round.global_seed.clone()), "seed repeated: {}", round.global_seed);
    }
    assert!(store.validators().unwrap().iter().all(|v| v.reveals_made == 10));
}

#[test]
fn failed_round_still_moves_the_seed() {
    // Either fork author holds half the stake, so fork choice cannot succeed
    let validators: Vec<_> = (1..=2).map(|id| multi_step_validator(id, 32.0, 5)).collect();
    let mut store = store_with(&validators);
    let genesis_seed = store.global_seed().unwrap();
    let config = SimulatorConfig::default();
    let mut rng = StdRng::seed_from_u64(11);

    let err = Round::run(&mut store, &config, &mut rng, START).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ForkChoiceError>(),
        Some(ForkChoiceError::SupermajorityUnreachable { .. })
    ));
    let first = store.global_seed().unwrap();
    assert_ne!(first, genesis_seed);
    assert!(store.validators().unwrap().iter().all(|v| v.reveals_made == 1));

    Round::run(&mut store, &config, &mut rng, START + 4).unwrap_err();
    let second = store.global_seed().unwrap();
    assert_ne!(second, genesis_seed);
    assert_ne!(second, first);
    assert!(store.validators().unwrap().iter().all(|v| v.reveals_made == 2));
    assert!(!store.contains(keys::CHAIN));
}

#[test]
fn empty_store_is_missing_state() {
    let mut store = SimulationStore::new(MemoryStore::new());
    let err = Round::run(&mut store, &SimulatorConfig::default(), &mut StdRng::seed_from_u64(4), START)
        .unwrap_err();
    assert_eq!(missing_key(&err), Some(keys::VALIDATORS));
    assert!(!store.contains(keys::PROPOSED_BLOCK));
}

#[test]
fn missing_seed_is_missing_state() {
    let mut kv = MemoryStore::new();
    kv.set(keys::VALIDATORS, serde_json::to_string(&uniform_validators(3)).unwrap()).unwrap();
    let mut store = SimulationStore::new(kv);
    let err = Round::run(&mut store, &SimulatorConfig::default(), &mut StdRng::seed_from_u64(5), START)
        .unwrap_err();
    assert_eq!(missing_key(&err), Some(keys::GLOBAL_SEED));
}

#[test]
fn malformed_validators_are_missing_state() {
    let mut kv = MemoryStore::new();
    kv.set(keys::VALIDATORS, "[{\"id\": \"one\"}]".to_string()).unwrap();
    kv.set(keys::GLOBAL_SEED, "0x01".to_string()).unwrap();
    let mut store = SimulationStore::new(kv);
    let err = Round::run(&mut store, &SimulatorConfig::default(), &mut StdRng::seed_from_u64(6), START)
        .unwrap_err();
    assert_eq!(missing_key(&err), Some(keys::VALIDATORS));
}

#[test]
fn rounds_build_a_chain() {
    let mut store = seeded_store(8);
    let config = SimulatorConfig::default();
    let rounds = run_rounds(&mut store, &config, &mut StdRng::seed_from_u64(7), 3, START).unwrap();
    assert_eq!(rounds.len(), 3);

    let chain = store.chain().unwrap();
    assert_eq!(chain.len(), 3);
    for (i, block) in chain.iter().enumerate() {
        assert_eq!(block.block_number, i as u64);
        assert_eq!(block.timestamp, START + 4 * i as u64);
    }
    for pair in chain.windows(2) {
        assert_eq!(pair[1].parent_hash, pair[0].hash);
    }

    // Each round starts from the stakes the previous one settled
    assert_eq!(rounds[1].settlement.validators.len(), rounds[0].validators.len());
    assert_eq!(store.validators().unwrap(), rounds[2].validators);
}

#[test]
fn same_seed_same_rounds() {
    let config = SimulatorConfig::default();
    let run = |seed| {
        let mut store = seeded_store(5);
        run_rounds(&mut store, &config, &mut StdRng::seed_from_u64(seed), 2, START).unwrap()
    };
    assert_eq!(run(8), run(8));
}

#[test]
fn file_store_resumes_after_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let config = SimulatorConfig::default();
    let mut rng = StdRng::seed_from_u64(9);

    let mut store = SimulationStore::new(JsonFileStore::open(&path).unwrap());
    let genesis = bootstrap_store(&mut store, &config, &mut rng).unwrap();
    assert_eq!(genesis.validators.len(), 15);
    Round::run(&mut store, &config, &mut rng, START).unwrap();
    drop(store);

    let mut reopened = SimulationStore::new(JsonFileStore::open(&path).unwrap());
    assert_eq!(reopened.chain().unwrap().len(), 1);
    let round = Round::run(&mut reopened, &config, &mut rng, START + 4).unwrap();
    assert_eq!(round.proposed.block_number, 1);
    assert_eq!(reopened.chain().unwrap().len(), 2);
}
