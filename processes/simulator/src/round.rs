//! One consensus round, from seed mixing to settlement

use crate::simulator_config::SimulatorConfig;
use anyhow::{bail, Context, Result};
use rand::RngCore;
use serde::Serialize;
use stakesim_common::{
    store::{keys, KeyValueStore, SimulationStore},
    Block, ChainChoice, HexValue, SimulationError, Validator, ValidatorId,
};
use stakesim_module_attestation::{run_attestation, select_committee, AttestationResult};
use stakesim_module_block_producer::{
    choose_fork_author, fork_block, generate_transactions, propose_block,
};
use stakesim_module_fork_choice::{resolve_fork, ForkResult};
use stakesim_module_randao::mix_reveals;
use stakesim_module_rewards::{pay_proposer, settle_rewards, ProposerReward, Settlement};
use stakesim_module_validator_selection::select_validator;
use tracing::{info, info_span, warn};

/// Record stored under `bettingResults`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingResults<'a> {
    pub fork: &'a ForkResult,
    pub settlement: &'a Settlement,
    pub proposer_reward: Option<&'a ProposerReward>,
}

/// Everything a round decided
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub global_seed: HexValue,
    pub proposer: ValidatorId,
    pub proposed: Block,
    pub forked: Block,
    pub attestation: AttestationResult,
    pub fork: ForkResult,
    pub settlement: Settlement,

    /// Absent when the finalized block's author was slashed
    pub proposer_reward: Option<ProposerReward>,

    /// Validator set after settlement and proposer reward
    pub validators: Vec<Validator>,
}

impl Round {
    /// The block the fork choice kept
    pub fn finalized(&self) -> &Block {
        match self.fork.finalized_chain {
            ChainChoice::Proposed => &self.proposed,
            ChainChoice::Forked => &self.forked,
        }
    }

    /// Run one round against `store`. `timestamp` is in seconds.
    ///
    /// The store must already hold a validator set and a global seed;
    /// every intermediate record is written back as it is produced. The
    /// mixed seed and the reveal counters behind it are saved together, so
    /// a round that fails later still moves the seed forward.
    pub fn run<S: KeyValueStore>(
        store: &mut SimulationStore<S>,
        config: &SimulatorConfig,
        rng: &mut dyn RngCore,
        timestamp: u64,
    ) -> Result<Round> {
        let mut validators = store.validators()?;
        let global_seed = store.global_seed()?;
        let mut chain = store.chain()?;
        let span = info_span!("round", block = chain.len());
        let _entered = span.enter();

        // The committee reveals first so the proposer draw sees fresh entropy
        let revealers: Vec<ValidatorId> =
            select_committee(&validators, config.attestation.committee_size)
                .iter()
                .map(|v| v.id)
                .collect();
        let global_seed = mix_reveals(&mut validators, &revealers, &global_seed, &config.randao)?;
        store.set_validators(&validators)?;
        store.set_global_seed(&global_seed)?;

        let active: Vec<Validator> = validators.iter().filter(|v| v.is_active()).cloned().collect();
        let proposer = select_validator(&active, &global_seed)?.clone();
        store.set_selected_validator(proposer.id)?;

        let transactions =
            generate_transactions(&mut *rng, &config.block_producer, timestamp * 1000);
        let proposed = propose_block(
            &proposer,
            chain.last(),
            transactions,
            timestamp,
            &config.block_producer,
            &mut *rng,
        );
        store.set_proposed_block(&proposed)?;

        let committee = select_committee(&validators, config.attestation.committee_size);
        let attestation = run_attestation(&committee, &config.attestation, &mut *rng)?;
        store.save(keys::ATTESTATION, &attestation)?;
        if !attestation.quorum_reached {
            bail!(
                "Block {} failed attestation: {} of {} approved",
                proposed.block_number,
                attestation.approved.len(),
                attestation.committee_size()
            );
        }

        let author = choose_fork_author(&validators, proposer.id, &mut *rng)?;
        let forked = fork_block(&proposed, author, &mut *rng);
        store.set_forked_block(&forked)?;

        let fork = resolve_fork(
            &validators,
            &proposed,
            &forked,
            &global_seed,
            &config.fork_choice,
            &mut *rng,
        )
        .with_context(|| format!("Fork choice failed for block {}", proposed.block_number))?;
        let settlement = settle_rewards(&validators, &fork, &config.rewards)?;

        let mut validators = settlement.validators.clone();
        let finalized = match fork.finalized_chain {
            ChainChoice::Proposed => &proposed,
            ChainChoice::Forked => &forked,
        };
        let proposer_reward = if fork.slashed.contains(&finalized.proposer) {
            warn!(validator = finalized.proposer, "Slashed proposer forfeits its reward");
            None
        } else {
            Some(pay_proposer(&mut validators, finalized, &config.rewards)?)
        };

        store.set_validators(&validators)?;
        store.save(
            keys::BETTING_RESULTS,
            &BettingResults {
                fork: &fork,
                settlement: &settlement,
                proposer_reward: proposer_reward.as_ref(),
            },
        )?;
        chain.push(finalized.clone());
        store.set_chain(&chain)?;

        info!(
            number = finalized.block_number,
            hash = %finalized.hash,
            proposer = finalized.proposer,
            finalized = %fork.finalized_chain,
            share = fork.proposed_share(),
            "Round complete"
        );
        Ok(Round {
            global_seed,
            proposer: proposer.id,
            proposed,
            forked,
            attestation,
            fork,
            settlement,
            proposer_reward,
            validators,
        })
    }
}

/// Fail with the first record a round would be missing
pub fn check_initialised<S: KeyValueStore>(store: &SimulationStore<S>) -> Result<(), SimulationError> {
    store.validators()?;
    store.global_seed()?;
    Ok(())
}
