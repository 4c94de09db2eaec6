pub mod bond;
pub mod error;
pub mod types;

pub use error::BondYieldError;
pub use types::*;

/// Standard result type for all bond-yield operations
pub type BondYieldResult<T> = Result<T, BondYieldError>;
