//! # Field Operations Core
//!
//! Settlement engine for a coin-operated kiosk business: drivers collect
//! cash from machines, report meter readings and settle the day's takings
//! against what the meters say they should have brought back.
//!
//! ## Features
//!
//! - **Revenue calculation**: Meter delta to revenue, owner commission and net payable
//! - **Expense review**: Public/private expenses and their effect on driver debt
//! - **Debt tracking**: Capped recovery of driver loans and site startup capital
//! - **Daily settlement**: Expected cash versus declared cash and coins, with admin confirmation
//! - **Payroll**: Base salary plus revenue commission minus debt withholding
//! - **Fleet oversight**: Site statistics, stagnant machines and risky drivers
//! - **Storage abstraction**: Backend-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldops_core::{CollectionBuilder, Driver, FieldLedger, Location, MemoryStorage};
//! use bigdecimal::BigDecimal;
//! use std::str::FromStr;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let mut ledger = FieldLedger::new(MemoryStorage::new());
//! ledger
//!     .register_location(
//!         Location::new(
//!             "L1".to_string(),
//!             "Mama Ntilie".to_string(),
//!             "M-01".to_string(),
//!             BigDecimal::from_str("0.15").unwrap(),
//!         )
//!         .with_last_score(1000),
//!     )
//!     .await
//!     .unwrap();
//! ledger
//!     .register_driver(Driver::new("D1".to_string(), "Nudin".to_string(), "nudin".to_string()))
//!     .await
//!     .unwrap();
//!
//! let receipt = ledger
//!     .record_collection(CollectionBuilder::new("L1".to_string(), "D1".to_string(), 1250))
//!     .await
//!     .unwrap();
//! assert_eq!(receipt.transaction.net_payable, BigDecimal::from(42500));
//! # });
//! # }
//! ```

pub mod audit;
pub mod calc;
pub mod config;
pub mod ledger;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use audit::{AiLogFilter, AiLogKind, AuditTrail};
pub use calc::*;
pub use config::EngineConfig;
pub use ledger::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
pub use utils::MemoryStorage;

// Re-export transaction patterns for convenience
pub use ledger::transaction::patterns;
