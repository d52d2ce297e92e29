//! Persistence boundary for the membership engine.

mod in_memory;
mod postgres;
mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{
    AccountCreationRecord, ApprovalRecord, MembershipStore, NewRequest, StatusChange, StoreError,
};
