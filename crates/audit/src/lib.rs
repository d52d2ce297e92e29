//! `medlem-audit` — append-only activity ledger.
//!
//! Every mutating admin operation records who did what to which resource.
//! Recording is best-effort by contract: a ledger failure must never abort
//! the caller's primary operation, so [`ActivityLedger::record`] does not
//! return one. Entries are immutable once written.

pub mod entry;
pub mod in_memory;
pub mod ledger;

pub use entry::{ActivityEntry, ActivityFilter};
pub use in_memory::InMemoryLedger;
pub use ledger::{ActivityLedger, LedgerError};
