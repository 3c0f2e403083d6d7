use anyhow::Result;
use config::Config;
use stakesim_common::configuration::{section_or_default, StartupMode};
use stakesim_module_attestation::AttestationParams;
use stakesim_module_block_producer::BlockParams;
use stakesim_module_fork_choice::ForkChoiceParams;
use stakesim_module_genesis_bootstrapper::GenesisParams;
use stakesim_module_randao::RandaoParams;
use stakesim_module_rewards::RewardParams;
use tracing::info;

const SECTION_GENESIS: &str = "genesis";
const SECTION_RANDAO: &str = "randao";
const SECTION_ATTESTATION: &str = "attestation";
const SECTION_FORK_CHOICE: &str = "fork-choice";
const SECTION_REWARDS: &str = "rewards";
const SECTION_BLOCK_PRODUCER: &str = "block-producer";

/// Every tunable of a simulation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatorConfig {
    pub startup: StartupMode,
    pub genesis: GenesisParams,
    pub randao: RandaoParams,
    pub attestation: AttestationParams,
    pub fork_choice: ForkChoiceParams,
    pub rewards: RewardParams,
    pub block_producer: BlockParams,
}

impl SimulatorConfig {
    /// Read and validate every section. Absent sections take their
    /// defaults, out-of-range values are rejected.
    pub fn new(config: &Config) -> Result<Self> {
        let simulator = Self {
            startup: StartupMode::from_config(config)?,
            genesis: section_or_default(config, SECTION_GENESIS)?,
            randao: section_or_default(config, SECTION_RANDAO)?,
            attestation: section_or_default(config, SECTION_ATTESTATION)?,
            fork_choice: section_or_default(config, SECTION_FORK_CHOICE)?,
            rewards: section_or_default(config, SECTION_REWARDS)?,
            block_producer: section_or_default(config, SECTION_BLOCK_PRODUCER)?,
        };
        simulator.validate()?;

        info!(
            startup = %simulator.startup,
            mix_policy = %simulator.randao.mix_policy,
            committee = simulator.attestation.committee_size,
            supermajority = %simulator.fork_choice.supermajority,
            frc = simulator.rewards.finality_reward_coefficient,
            "Loaded simulator configuration"
        );
        Ok(simulator)
    }

    pub fn validate(&self) -> Result<()> {
        self.genesis.validate()?;
        self.attestation.validate()?;
        self.fork_choice.validate()?;
        self.rewards.validate()?;
        self.block_producer.validate()?;
        Ok(())
    }
}
