// Staking simulator common library - main library exports

pub mod configuration;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod hex_value;
pub mod rational_number;
pub mod store;
pub mod types;

// Flattened re-exports
pub use self::error::SimulationError;
pub use self::hash::Hash;
pub use self::hex_value::HexValue;
pub use self::types::*;
