pub mod error;
pub mod ledger;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod repos;

pub use error::{LedgerError, LedgerResult};
pub use ledger::LedgerStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{Fault, MemoryLedger};
pub use repos::PgLedger;
