//! Postgres-backed activity ledger.
//!
//! Writes are best-effort by contract: a failed insert is logged at WARN and
//! dropped, never surfaced to the operation being audited. The table is
//! append-only; there is no update or delete path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use medlem_audit::{ActivityEntry, ActivityFilter, ActivityLedger, LedgerError};
use medlem_core::{Pagination, UserId};

#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn try_record(&self, entry: &ActivityEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO activity_log (
                id, actor, action, resource_type, resource_id, description,
                before_state, after_state, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor.as_uuid())
        .bind(&entry.action)
        .bind(entry.resource_type.as_str())
        .bind(entry.resource_id.as_deref())
        .bind(&entry.description)
        .bind(entry.before.as_ref())
        .bind(entry.after.as_ref())
        .bind(entry.occurred_at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ActivityLedger for PostgresLedger {
    async fn record(&self, entry: ActivityEntry) {
        if let Err(e) = self.try_record(&entry).await {
            tracing::warn!(
                action = %entry.action,
                error = %e,
                "activity entry dropped: ledger insert failed"
            );
        }
    }

    async fn query(
        &self,
        filter: ActivityFilter,
        page: Pagination,
    ) -> Result<Vec<ActivityEntry>, LedgerError> {
        let actor = filter.actor.map(|a| *a.as_uuid());
        let action_like = filter.action_contains.map(|s| format!("%{s}%"));

        let rows = sqlx::query(
            r#"
            SELECT id, actor, action, resource_type, resource_id, description,
                   before_state, after_state, occurred_at
            FROM activity_log
            WHERE ($1::uuid IS NULL OR actor = $1)
              AND ($2::text IS NULL OR action LIKE $2)
              AND ($3::text IS NULL OR resource_type = $3)
              AND ($4::text IS NULL OR resource_id = $4)
              AND ($5::timestamptz IS NULL OR occurred_at >= $5)
              AND ($6::timestamptz IS NULL OR occurred_at <= $6)
            ORDER BY occurred_at DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(actor)
        .bind(action_like)
        .bind(filter.resource_type)
        .bind(filter.resource_id)
        .bind(filter.occurred_after)
        .bind(filter.occurred_before)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| LedgerError::Backend(e.to_string()))?;

        rows.iter()
            .map(|r| {
                ActivityRow::from_row(r)
                    .map(ActivityEntry::from)
                    .map_err(|e| LedgerError::Backend(e.to_string()))
            })
            .collect()
    }
}

#[derive(Debug)]
struct ActivityRow {
    id: Uuid,
    actor: Uuid,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    description: String,
    before_state: Option<serde_json::Value>,
    after_state: Option<serde_json::Value>,
    occurred_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ActivityRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ActivityRow {
            id: row.try_get("id")?,
            actor: row.try_get("actor")?,
            action: row.try_get("action")?,
            resource_type: row.try_get("resource_type")?,
            resource_id: row.try_get("resource_id")?,
            description: row.try_get("description")?,
            before_state: row.try_get("before_state")?,
            after_state: row.try_get("after_state")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl From<ActivityRow> for ActivityEntry {
    fn from(row: ActivityRow) -> Self {
        ActivityEntry {
            id: row.id,
            actor: UserId::from_uuid(row.actor),
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            description: row.description,
            before: row.before_state,
            after: row.after_state,
            occurred_at: row.occurred_at,
        }
    }
}
