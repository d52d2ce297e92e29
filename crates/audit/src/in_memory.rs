//! In-memory ledger for tests/dev.

use std::sync::RwLock;

use medlem_core::Pagination;

use crate::entry::{ActivityEntry, ActivityFilter};
use crate::ledger::{ActivityLedger, LedgerError};

/// In-memory append-only ledger. Not optimized for large histories.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: RwLock<Vec<ActivityEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded entries (test helper).
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ActivityLedger for InMemoryLedger {
    async fn record(&self, entry: ActivityEntry) {
        match self.entries.write() {
            Ok(mut entries) => entries.push(entry),
            Err(_) => tracing::warn!("activity ledger lock poisoned; entry dropped"),
        }
    }

    async fn query(
        &self,
        filter: ActivityFilter,
        page: Pagination,
    ) -> Result<Vec<ActivityEntry>, LedgerError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LedgerError::Backend("lock poisoned".to_string()))?;

        let mut matching: Vec<ActivityEntry> = entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        // Newest first.
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        Ok(matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use medlem_core::UserId;

    use super::*;

    #[tokio::test]
    async fn query_is_newest_first_and_paginated() {
        let ledger = InMemoryLedger::new();
        let actor = UserId::new();

        for i in 0..5 {
            let mut entry = ActivityEntry::new(actor, "user.update", "user", format!("change {i}"));
            entry.occurred_at = entry.occurred_at + chrono::Duration::seconds(i);
            ledger.record(entry).await;
        }

        let page = ledger
            .query(ActivityFilter::default(), Pagination { limit: 2, offset: 0 })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].description, "change 4");
        assert_eq!(page[1].description, "change 3");

        let next = ledger
            .query(ActivityFilter::default(), Pagination { limit: 2, offset: 2 })
            .await
            .unwrap();
        assert_eq!(next[0].description, "change 2");
    }

    #[tokio::test]
    async fn filter_narrows_results() {
        let ledger = InMemoryLedger::new();
        let actor = UserId::new();

        ledger
            .record(ActivityEntry::new(actor, "membership_request.approve", "membership_request", "a"))
            .await;
        ledger
            .record(ActivityEntry::new(UserId::new(), "user.create", "user", "b"))
            .await;

        let filter = ActivityFilter {
            actor: Some(actor),
            ..Default::default()
        };
        let rows = ledger.query(filter, Pagination::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "a");
    }
}
