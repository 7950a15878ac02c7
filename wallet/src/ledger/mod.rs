//! # Ledger: History Reconstruction
//!
//! The chain does not tell us "Alice sent you 5 USDC". It tells us that,
//! in some transaction, account #3's token balance went from 9 to 4 and
//! account #0's went from 0 to 5, and that account #0 is us. This module
//! turns that into ledger lines.
//!
//! ```text
//! types.rs      RawTransaction in, LedgerEntry out
//! reconcile.rs  Reconciler: deltas, fee isolation, classification, dedup
//! filter.rs     LedgerFilter: validation and matching
//! report.rs     LedgerReport: filter, sort, totals
//! ```

pub mod filter;
pub mod reconcile;
pub mod report;
pub mod types;

pub use filter::LedgerFilter;
pub use reconcile::{dedup_signatures, Reconciler};
pub use report::LedgerReport;
pub use types::{Direction, LedgerEntry, RawTransaction, TokenBalance, TxStatus};
