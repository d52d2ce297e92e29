//! Ledger contract.

use std::sync::Arc;

use thiserror::Error;

use medlem_core::Pagination;

use crate::entry::{ActivityEntry, ActivityFilter};

/// Ledger operation error (query side only).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger backend error: {0}")]
    Backend(String),
}

/// Append-only activity ledger.
///
/// `record` is fire-and-forget: implementations capture their own failures
/// (tracing them locally) instead of surfacing them, so a broken audit sink
/// can never abort an approval or a role change. `query` returns entries
/// newest-first.
#[async_trait::async_trait]
pub trait ActivityLedger: Send + Sync {
    async fn record(&self, entry: ActivityEntry);

    async fn query(
        &self,
        filter: ActivityFilter,
        page: Pagination,
    ) -> Result<Vec<ActivityEntry>, LedgerError>;
}

#[async_trait::async_trait]
impl<L> ActivityLedger for Arc<L>
where
    L: ActivityLedger + ?Sized,
{
    async fn record(&self, entry: ActivityEntry) {
        (**self).record(entry).await
    }

    async fn query(
        &self,
        filter: ActivityFilter,
        page: Pagination,
    ) -> Result<Vec<ActivityEntry>, LedgerError> {
        (**self).query(filter, page).await
    }
}
