//! Postgres-backed membership store.
//!
//! ## Schema (summary)
//!
//! | table | notable constraints |
//! |---|---|
//! | `users` | `users_email_key` UNIQUE(email) |
//! | `membership_requests` | `membership_requests_number_key` UNIQUE(number_year, number_seq); `membership_requests_open_email_idx` partial UNIQUE(email) WHERE status IN (open/approved) |
//! | `members` | `members_number_key` UNIQUE(number_year, number_seq); `members_email_key` UNIQUE(email) |
//! | `request_status_history` | FK to `membership_requests` |
//!
//! ## Sequence allocation
//!
//! Request and member numbers are `max(seq)+1` per calendar year, computed
//! inside the same transaction as the insert. A concurrent writer landing on
//! the same `(year, seq)` trips the unique constraint (SQLSTATE 23505); the
//! whole transaction is retried a bounded number of times before surfacing a
//! `Conflict`. A naive unguarded read-then-increment would hand out duplicate
//! numbers under load.
//!
//! ## Error mapping
//!
//! | SQLx error | mapped to |
//! |---|---|
//! | Database 23505 (unique violation) | `Conflict` (with constraint name) |
//! | Database other | `Backend` |
//! | RowNotFound | `NotFound` |
//! | anything else | `Backend` |

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use medlem_auth::{Role, User};
use medlem_core::{MemberId, Pagination, RequestId, UserId};
use medlem_membership::{
    ApprovalTrack, Member, MemberNumber, MembershipKind, MembershipRequest, RequestNumber,
    RequestStatus, StatusHistoryEntry,
};

use super::r#trait::{
    AccountCreationRecord, ApprovalRecord, MembershipStore, NewRequest, StatusChange, StoreError,
};

/// Attempts per number allocation before giving up.
const MAX_NUMBER_RETRIES: u32 = 3;

const REQUEST_COLUMNS: &str = "id, request_number, first_name, last_name, email, phone, street, \
     postal_code, city, motivation, kind, track, status, submitted_at, submitted_by, decided_by, \
     decided_at, decision_notes, member_id";

const MEMBER_COLUMNS: &str =
    "id, member_number, email, full_name, user_id, kind, is_active, joined_at, created_from";

const USER_COLUMNS: &str =
    "id, email, display_name, password_hash, role, is_board_member, is_active, created_at";

/// Postgres-backed store. Cheap to clone; all operations go through the
/// connection pool, which is thread-safe.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn load_request_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: RequestId,
    ) -> Result<MembershipRequest, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM membership_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_request_for_update", e))?
        .ok_or(StoreError::NotFound)?;

        RequestRow::from_row(&row)
            .map_err(|e| StoreError::Serialization(e.to_string()))?
            .try_into()
    }

    async fn insert_history(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        change: &StatusChange,
        from: RequestStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO request_status_history (id, request_id, from_status, to_status, actor, notes, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(change.request_id.as_uuid())
        .bind(from.as_str())
        .bind(change.to.as_str())
        .bind(change.actor.as_uuid())
        .bind(change.notes.as_deref())
        .bind(change.occurred_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_history", e))?;

        Ok(())
    }

    async fn insert_user_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, password_hash, role, is_board_member, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(user.display_name.as_deref())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_board_member)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        Ok(())
    }

    async fn next_seq(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: NumberTable,
        year: i32,
    ) -> Result<u32, StoreError> {
        let sql = match table {
            NumberTable::Requests => {
                "SELECT COALESCE(MAX(number_seq), 0) AS max_seq FROM membership_requests WHERE number_year = $1"
            }
            NumberTable::Members => {
                "SELECT COALESCE(MAX(number_seq), 0) AS max_seq FROM members WHERE number_year = $1"
            }
        };

        let row = sqlx::query(sql)
            .bind(year)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("next_seq", e))?;

        let max_seq: i32 = row
            .try_get("max_seq")
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(max_seq as u32 + 1)
    }
}

#[derive(Debug, Copy, Clone)]
enum NumberTable {
    Requests,
    Members,
}

#[async_trait::async_trait]
impl MembershipStore for PostgresStore {
    #[instrument(skip(self, request), fields(request_id = %request.id), err)]
    async fn insert_request(&self, request: NewRequest) -> Result<MembershipRequest, StoreError> {
        let year = request.submitted_at.year();

        for attempt in 1..=MAX_NUMBER_RETRIES {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin", e))?;

            let seq = self.next_seq(&mut tx, NumberTable::Requests, year).await?;
            let number = RequestNumber::new(year, seq);

            let result = sqlx::query(
                r#"
                INSERT INTO membership_requests (
                    id, request_number, number_year, number_seq,
                    first_name, last_name, email, phone, street, postal_code, city, motivation,
                    kind, track, status, submitted_at, submitted_by
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
            )
            .bind(request.id.as_uuid())
            .bind(number.as_str())
            .bind(year)
            .bind(seq as i32)
            .bind(&request.applicant.first_name)
            .bind(&request.applicant.last_name)
            .bind(&request.applicant.email)
            .bind(request.applicant.phone.as_deref())
            .bind(&request.applicant.street)
            .bind(&request.applicant.postal_code)
            .bind(&request.applicant.city)
            .bind(&request.applicant.motivation)
            .bind(request.kind.as_str())
            .bind(request.track.as_str())
            .bind(RequestStatus::Pending.as_str())
            .bind(request.submitted_at)
            .bind(request.submitted_by.map(|u| *u.as_uuid()))
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {
                    tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
                    return Ok(MembershipRequest {
                        id: request.id,
                        number,
                        applicant: request.applicant,
                        kind: request.kind,
                        track: request.track,
                        status: RequestStatus::Pending,
                        submitted_at: request.submitted_at,
                        submitted_by: request.submitted_by,
                        decided_by: None,
                        decided_at: None,
                        decision_notes: None,
                        member_id: None,
                    });
                }
                Err(e) if violates(&e, "membership_requests_number_key") => {
                    // Lost the allocation race; roll back and retry.
                    let _ = tx.rollback().await;
                    tracing::debug!(attempt, "request number contention, retrying");
                    continue;
                }
                Err(e) => {
                    let _ = tx.rollback().await;
                    return Err(map_sqlx_error("insert_request", e));
                }
            }
        }

        Err(StoreError::Conflict(
            "request number allocation contended; retry the submission".to_string(),
        ))
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<MembershipRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM membership_requests WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_request", e))?;

        row.map(|r| {
            RequestRow::from_row(&r)
                .map_err(|e| StoreError::Serialization(e.to_string()))?
                .try_into()
        })
        .transpose()
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
        page: Pagination,
    ) -> Result<Vec<MembershipRequest>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS} FROM membership_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY submitted_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_requests", e))?;

        rows.iter()
            .map(|r| {
                RequestRow::from_row(r)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?
                    .try_into()
            })
            .collect()
    }

    async fn find_blocking_request_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MembershipRequest>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS} FROM membership_requests
            WHERE email = $1
              AND status IN ('PENDING', 'UNDER_REVIEW', 'ADDITIONAL_INFO_REQUESTED', 'APPROVED')
            LIMIT 1
            "#
        ))
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_blocking_request_by_email", e))?;

        row.map(|r| {
            RequestRow::from_row(&r)
                .map_err(|e| StoreError::Serialization(e.to_string()))?
                .try_into()
        })
        .transpose()
    }

    #[instrument(skip(self, change), fields(request_id = %change.request_id, to = %change.to), err)]
    async fn update_status(&self, change: StatusChange) -> Result<MembershipRequest, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let current = self.load_request_for_update(&mut tx, change.request_id).await?;

        if current.status.is_terminal() {
            let _ = tx.rollback().await;
            return Err(StoreError::Conflict(format!(
                "request is already {}",
                current.status
            )));
        }

        let terminal = change.to.is_terminal();
        sqlx::query(
            r#"
            UPDATE membership_requests
            SET status = $2,
                decided_by = CASE WHEN $3 THEN $4 ELSE decided_by END,
                decided_at = CASE WHEN $3 THEN $5 ELSE decided_at END,
                decision_notes = CASE WHEN $3 THEN $6 ELSE decision_notes END
            WHERE id = $1
            "#,
        )
        .bind(change.request_id.as_uuid())
        .bind(change.to.as_str())
        .bind(terminal)
        .bind(change.actor.as_uuid())
        .bind(change.occurred_at)
        .bind(change.notes.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_status", e))?;

        let from = current.status;
        self.insert_history(&mut tx, &change, from).await?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        let mut updated = current;
        updated.status = change.to;
        if terminal {
            updated.decided_by = Some(change.actor);
            updated.decided_at = Some(change.occurred_at);
            updated.decision_notes = change.notes;
        }
        Ok(updated)
    }

    #[instrument(skip(self, record), fields(request_id = %record.request_id), err)]
    async fn commit_approval(
        &self,
        record: ApprovalRecord,
    ) -> Result<(MembershipRequest, Member, User), StoreError> {
        let year = record.occurred_at.year();

        for attempt in 1..=MAX_NUMBER_RETRIES {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin", e))?;

            let current = self.load_request_for_update(&mut tx, record.request_id).await?;
            if current.status.is_terminal() {
                let _ = tx.rollback().await;
                return Err(StoreError::Conflict(format!(
                    "request is already {}",
                    current.status
                )));
            }

            self.insert_user_row(&mut tx, &record.new_user).await?;

            let seq = self.next_seq(&mut tx, NumberTable::Members, year).await?;
            let number = MemberNumber::new(year, seq);

            let member = Member {
                id: record.member_id,
                number: number.clone(),
                email: current.applicant.email.clone(),
                full_name: current.applicant.full_name(),
                user_id: Some(record.new_user.id),
                kind: record.member_kind,
                is_active: true,
                joined_at: record.occurred_at,
                created_from: current.id,
            };

            let result = sqlx::query(
                r#"
                INSERT INTO members (
                    id, member_number, number_year, number_seq,
                    email, full_name, user_id, kind, is_active, joined_at, created_from
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(member.id.as_uuid())
            .bind(number.as_str())
            .bind(year)
            .bind(seq as i32)
            .bind(&member.email)
            .bind(&member.full_name)
            .bind(member.user_id.map(|u| *u.as_uuid()))
            .bind(member.kind.as_str())
            .bind(member.is_active)
            .bind(member.joined_at)
            .bind(member.created_from.as_uuid())
            .execute(&mut *tx)
            .await;

            if let Err(e) = result {
                let _ = tx.rollback().await;
                if violates(&e, "members_number_key") && attempt < MAX_NUMBER_RETRIES {
                    tracing::debug!(attempt, "member number contention, retrying");
                    continue;
                }
                return Err(map_sqlx_error("insert_member", e));
            }

            let change = StatusChange {
                request_id: record.request_id,
                to: RequestStatus::Approved,
                actor: record.actor,
                notes: record.notes.clone(),
                occurred_at: record.occurred_at,
            };

            sqlx::query(
                r#"
                UPDATE membership_requests
                SET status = $2, decided_by = $3, decided_at = $4, decision_notes = $5, member_id = $6
                WHERE id = $1
                "#,
            )
            .bind(record.request_id.as_uuid())
            .bind(RequestStatus::Approved.as_str())
            .bind(record.actor.as_uuid())
            .bind(record.occurred_at)
            .bind(record.notes.as_deref())
            .bind(member.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("approve_request", e))?;

            let from = current.status;
            self.insert_history(&mut tx, &change, from).await?;

            tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

            let mut updated = current;
            updated.status = RequestStatus::Approved;
            updated.decided_by = Some(record.actor);
            updated.decided_at = Some(record.occurred_at);
            updated.decision_notes = record.notes.clone();
            updated.member_id = Some(member.id);

            return Ok((updated, member, record.new_user));
        }

        Err(StoreError::Conflict(
            "member number allocation contended; retry the approval".to_string(),
        ))
    }

    #[instrument(skip(self, record), fields(member_id = %record.member_id), err)]
    async fn commit_account_creation(
        &self,
        record: AccountCreationRecord,
    ) -> Result<User, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let row = sqlx::query("SELECT user_id FROM members WHERE id = $1 FOR UPDATE")
            .bind(record.member_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_member_for_update", e))?
            .ok_or(StoreError::NotFound)?;

        let linked: Option<Uuid> = row
            .try_get("user_id")
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if linked.is_some() {
            let _ = tx.rollback().await;
            return Err(StoreError::Conflict(
                "member already has a linked account".to_string(),
            ));
        }

        self.insert_user_row(&mut tx, &record.new_user).await?;

        sqlx::query("UPDATE members SET user_id = $2 WHERE id = $1")
            .bind(record.member_id.as_uuid())
            .bind(record.new_user.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("link_member_account", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(record.new_user)
    }

    #[instrument(skip(self), fields(request_id = %id), err)]
    async fn delete_pending_request(&self, id: RequestId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let current = self.load_request_for_update(&mut tx, id).await?;
        if current.status != RequestStatus::Pending {
            let _ = tx.rollback().await;
            return Err(StoreError::Conflict(format!(
                "request is {}",
                current.status
            )));
        }

        sqlx::query("DELETE FROM request_status_history WHERE request_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_history", e))?;

        sqlx::query("DELETE FROM membership_requests WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_request", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    async fn request_history(
        &self,
        id: RequestId,
    ) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, request_id, from_status, to_status, actor, notes, occurred_at
            FROM request_status_history
            WHERE request_id = $1
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("request_history", e))?;

        rows.iter()
            .map(|r| {
                HistoryRow::from_row(r)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?
                    .try_into()
            })
            .collect()
    }

    async fn get_member(&self, id: MemberId) -> Result<Option<Member>, StoreError> {
        let row = sqlx::query(&format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_member", e))?;

        row.map(|r| {
            MemberRow::from_row(&r)
                .map_err(|e| StoreError::Serialization(e.to_string()))?
                .try_into()
        })
        .transpose()
    }

    async fn list_members(&self, page: Pagination) -> Result<Vec<Member>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members ORDER BY joined_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_members", e))?;

        rows.iter()
            .map(|r| {
                MemberRow::from_row(r)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?
                    .try_into()
            })
            .collect()
    }

    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_member_by_email", e))?;

        row.map(|r| {
            MemberRow::from_row(&r)
                .map_err(|e| StoreError::Serialization(e.to_string()))?
                .try_into()
        })
        .transpose()
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        self.insert_user_row(&mut tx, &user).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;

        row.map(|r| {
            UserRow::from_row(&r)
                .map_err(|e| StoreError::Serialization(e.to_string()))?
                .try_into()
        })
        .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_email", e))?;

        row.map(|r| {
            UserRow::from_row(&r)
                .map_err(|e| StoreError::Serialization(e.to_string()))?
                .try_into()
        })
        .transpose()
    }

    async fn list_users(&self, page: Pagination) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.iter()
            .map(|r| {
                UserRow::from_row(r)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?
                    .try_into()
            })
            .collect()
    }

    async fn update_user_role(
        &self,
        id: UserId,
        role: Role,
        is_board_member: bool,
    ) -> Result<User, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET role = $2, is_board_member = $3
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(role.as_str())
        .bind(is_board_member)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user_role", e))?
        .ok_or(StoreError::NotFound)?;

        UserRow::from_row(&row)
            .map_err(|e| StoreError::Serialization(e.to_string()))?
            .try_into()
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<User, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET is_active = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(active)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_user_active", e))?
        .ok_or(StoreError::NotFound)?;

        UserRow::from_row(&row)
            .map_err(|e| StoreError::Serialization(e.to_string()))?
            .try_into()
    }

    async fn count_active_admins(&self) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM users WHERE role = 'ADMIN' AND is_active = TRUE",
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_active_admins", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(total as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                StoreError::Conflict(format!(
                    "unique violation in {}: {}",
                    operation,
                    db_err.constraint().unwrap_or("unknown constraint")
                ))
            } else {
                StoreError::Backend(format!("database error in {}: {}", operation, db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

/// Whether `err` is a unique violation on a specific constraint.
fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505")
            && db_err.constraint() == Some(constraint);
    }
    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Row types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct RequestRow {
    id: Uuid,
    request_number: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    street: String,
    postal_code: String,
    city: String,
    motivation: String,
    kind: String,
    track: String,
    status: String,
    submitted_at: DateTime<Utc>,
    submitted_by: Option<Uuid>,
    decided_by: Option<Uuid>,
    decided_at: Option<DateTime<Utc>>,
    decision_notes: Option<String>,
    member_id: Option<Uuid>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for RequestRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(RequestRow {
            id: row.try_get("id")?,
            request_number: row.try_get("request_number")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            street: row.try_get("street")?,
            postal_code: row.try_get("postal_code")?,
            city: row.try_get("city")?,
            motivation: row.try_get("motivation")?,
            kind: row.try_get("kind")?,
            track: row.try_get("track")?,
            status: row.try_get("status")?,
            submitted_at: row.try_get("submitted_at")?,
            submitted_by: row.try_get("submitted_by")?,
            decided_by: row.try_get("decided_by")?,
            decided_at: row.try_get("decided_at")?,
            decision_notes: row.try_get("decision_notes")?,
            member_id: row.try_get("member_id")?,
        })
    }
}

impl TryFrom<RequestRow> for MembershipRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let decode = |e: medlem_core::DomainError| StoreError::Serialization(e.to_string());

        Ok(MembershipRequest {
            id: RequestId::from_uuid(row.id),
            number: row.request_number.parse::<RequestNumber>().map_err(decode)?,
            applicant: medlem_membership::ApplicantDetails {
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                phone: row.phone,
                street: row.street,
                postal_code: row.postal_code,
                city: row.city,
                motivation: row.motivation,
            },
            kind: row.kind.parse::<MembershipKind>().map_err(decode)?,
            track: row.track.parse::<ApprovalTrack>().map_err(decode)?,
            status: row.status.parse::<RequestStatus>().map_err(decode)?,
            submitted_at: row.submitted_at,
            submitted_by: row.submitted_by.map(UserId::from_uuid),
            decided_by: row.decided_by.map(UserId::from_uuid),
            decided_at: row.decided_at,
            decision_notes: row.decision_notes,
            member_id: row.member_id.map(MemberId::from_uuid),
        })
    }
}

#[derive(Debug)]
struct MemberRow {
    id: Uuid,
    member_number: String,
    email: String,
    full_name: String,
    user_id: Option<Uuid>,
    kind: String,
    is_active: bool,
    joined_at: DateTime<Utc>,
    created_from: Uuid,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for MemberRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MemberRow {
            id: row.try_get("id")?,
            member_number: row.try_get("member_number")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            user_id: row.try_get("user_id")?,
            kind: row.try_get("kind")?,
            is_active: row.try_get("is_active")?,
            joined_at: row.try_get("joined_at")?,
            created_from: row.try_get("created_from")?,
        })
    }
}

impl TryFrom<MemberRow> for Member {
    type Error = StoreError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let decode = |e: medlem_core::DomainError| StoreError::Serialization(e.to_string());

        Ok(Member {
            id: MemberId::from_uuid(row.id),
            number: row.member_number.parse::<MemberNumber>().map_err(decode)?,
            email: row.email,
            full_name: row.full_name,
            user_id: row.user_id.map(UserId::from_uuid),
            kind: row.kind.parse::<MembershipKind>().map_err(decode)?,
            is_active: row.is_active,
            joined_at: row.joined_at,
            created_from: RequestId::from_uuid(row.created_from),
        })
    }
}

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: Option<String>,
    password_hash: String,
    role: String,
    is_board_member: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            password_hash: row.try_get("password_hash")?,
            role: row.try_get("role")?,
            is_board_member: row.try_get("is_board_member")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from_uuid(row.id),
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role: row
                .role
                .parse::<Role>()
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            is_board_member: row.is_board_member,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct HistoryRow {
    id: Uuid,
    request_id: Uuid,
    from_status: String,
    to_status: String,
    actor: Uuid,
    notes: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for HistoryRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(HistoryRow {
            id: row.try_get("id")?,
            request_id: row.try_get("request_id")?,
            from_status: row.try_get("from_status")?,
            to_status: row.try_get("to_status")?,
            actor: row.try_get("actor")?,
            notes: row.try_get("notes")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<HistoryRow> for StatusHistoryEntry {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let decode = |e: medlem_core::DomainError| StoreError::Serialization(e.to_string());

        Ok(StatusHistoryEntry {
            id: row.id,
            request_id: RequestId::from_uuid(row.request_id),
            from: row.from_status.parse::<RequestStatus>().map_err(decode)?,
            to: row.to_status.parse::<RequestStatus>().map_err(decode)?,
            actor: UserId::from_uuid(row.actor),
            notes: row.notes,
            occurred_at: row.occurred_at,
        })
    }
}
