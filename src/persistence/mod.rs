//! Persistence Layer
//!
//! Durable record of completed games, written after every game so a partial
//! run keeps what it finished.

pub mod ledger;

pub use ledger::{LedgerRow, ResultsLedger};
