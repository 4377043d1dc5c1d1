pub mod dates;
pub mod error;
pub mod facts;
pub mod servicing;
pub mod settlement;
pub mod types;
pub mod waterfall;

pub use error::LedgerError;
pub use types::*;

/// Standard result type for all loan-ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
