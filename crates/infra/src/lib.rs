//! `medlem-infra` — persistence and orchestration.
//!
//! The [`store::MembershipStore`] trait is the persistence boundary: reads
//! plus a small set of composite operations whose implementations must be
//! atomic (status change + history row, approval's user/member/request
//! writes). [`engine::MembershipEngine`] drives every lifecycle operation
//! against that boundary and owns the ordering rule the rest of the system
//! relies on: validate → mutate atomically → record activity → dispatch
//! best-effort notifications.

pub mod engine;
pub mod ledger;
pub mod store;

pub use engine::{
    ApprovalOutcome, CreateUserInput, CreatedUser, EngineError, MembershipEngine, SubmitInput,
};
pub use ledger::PostgresLedger;
pub use store::{
    AccountCreationRecord, ApprovalRecord, InMemoryStore, MembershipStore, NewRequest,
    PostgresStore, StatusChange, StoreError,
};

#[cfg(test)]
mod integration_tests;
