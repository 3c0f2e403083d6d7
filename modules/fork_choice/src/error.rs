//! Error types for fork choice

use stakesim_common::{rational_number::RationalNumber, BlockHash, SimulationError, ValidatorId};

/// Errors returned by [`resolve_fork`](crate::resolve_fork).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForkChoiceError {
    /// The two blocks do not compete for the same slot.
    #[error("blocks {proposed} and {forked} are not competing for the same slot")]
    NotConflicting {
        proposed: BlockHash,
        forked: BlockHash,
    },

    /// A block author is missing from the validator set.
    #[error("block author {id} is not in the validator set")]
    UnknownAuthor { id: ValidatorId },

    /// The forked author's fixed stake outweighs everything the proposed
    /// chain could gather.
    #[error("proposed chain can gather at most {achievable:.4} of voting stake, short of {required}")]
    SupermajorityUnreachable {
        achievable: f64,
        required: RationalNumber,
    },

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}
