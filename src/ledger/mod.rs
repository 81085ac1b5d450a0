//! Ledger module containing fleet management, collection processing and debt balances

pub mod core;
pub mod debt;
pub mod fleet;
pub mod transaction;

pub use self::core::*;
pub use debt::*;
pub use fleet::*;
pub use transaction::*;
