use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Datelike;
use uuid::Uuid;

use medlem_auth::{Role, User};
use medlem_core::{MemberId, Pagination, RequestId, UserId};
use medlem_membership::{
    Member, MemberNumber, MembershipRequest, RequestNumber, RequestStatus, StatusHistoryEntry,
};

use super::r#trait::{
    AccountCreationRecord, ApprovalRecord, MembershipStore, NewRequest, StatusChange, StoreError,
};

#[derive(Debug, Default)]
struct Inner {
    requests: HashMap<RequestId, MembershipRequest>,
    history: Vec<StatusHistoryEntry>,
    members: HashMap<MemberId, Member>,
    users: HashMap<UserId, User>,
}

/// In-memory store for tests/dev.
///
/// All composite operations run under a single write guard, which gives them
/// the same all-or-nothing visibility the Postgres store gets from
/// transactions. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl Inner {
    fn next_request_seq(&self, year: i32) -> u32 {
        self.requests
            .values()
            .filter(|r| r.number.year() == year)
            .map(|r| r.number.seq())
            .max()
            .unwrap_or(0)
            + 1
    }

    fn next_member_seq(&self, year: i32) -> u32 {
        self.members
            .values()
            .filter(|m| m.number.year() == year)
            .map(|m| m.number.seq())
            .max()
            .unwrap_or(0)
            + 1
    }

    fn blocking_request_by_email(&self, email: &str) -> Option<&MembershipRequest> {
        self.requests.values().find(|r| {
            r.applicant.email == email
                && matches!(
                    r.status,
                    RequestStatus::Pending
                        | RequestStatus::UnderReview
                        | RequestStatus::AdditionalInfoRequested
                        | RequestStatus::Approved
                )
        })
    }

    fn push_history(&mut self, change: &StatusChange, from: RequestStatus) {
        self.history.push(StatusHistoryEntry {
            id: Uuid::now_v7(),
            request_id: change.request_id,
            from,
            to: change.to,
            actor: change.actor,
            notes: change.notes.clone(),
            occurred_at: change.occurred_at,
        });
    }
}

#[async_trait::async_trait]
impl MembershipStore for InMemoryStore {
    async fn insert_request(&self, request: NewRequest) -> Result<MembershipRequest, StoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        if inner
            .blocking_request_by_email(&request.applicant.email)
            .is_some()
        {
            return Err(StoreError::Conflict(
                "email already has an open or approved request".to_string(),
            ));
        }

        let year = request.submitted_at.year();
        let seq = inner.next_request_seq(year);

        let stored = MembershipRequest {
            id: request.id,
            number: RequestNumber::new(year, seq),
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
        };

        inner.requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<MembershipRequest>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.requests.get(&id).cloned())
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
        page: Pagination,
    ) -> Result<Vec<MembershipRequest>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;

        let mut rows: Vec<MembershipRequest> = inner
            .requests
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn find_blocking_request_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MembershipRequest>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.blocking_request_by_email(email).cloned())
    }

    async fn update_status(&self, change: StatusChange) -> Result<MembershipRequest, StoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        let current = inner
            .requests
            .get(&change.request_id)
            .ok_or(StoreError::NotFound)?
            .clone();

        if current.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "request is already {}",
                current.status
            )));
        }

        let from = current.status;
        let mut updated = current;
        updated.status = change.to;
        if change.to.is_terminal() {
            updated.decided_by = Some(change.actor);
            updated.decided_at = Some(change.occurred_at);
            updated.decision_notes = change.notes.clone();
        }

        inner.push_history(&change, from);
        inner.requests.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn commit_approval(
        &self,
        record: ApprovalRecord,
    ) -> Result<(MembershipRequest, Member, User), StoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        let current = inner
            .requests
            .get(&record.request_id)
            .ok_or(StoreError::NotFound)?
            .clone();

        if current.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "request is already {}",
                current.status
            )));
        }

        if inner
            .members
            .values()
            .any(|m| m.email == record.new_user.email)
        {
            return Err(StoreError::Conflict(
                "email already belongs to a member".to_string(),
            ));
        }
        if inner
            .users
            .values()
            .any(|u| u.email == record.new_user.email)
        {
            return Err(StoreError::Conflict(
                "email already belongs to a user".to_string(),
            ));
        }

        let year = record.occurred_at.year();
        let seq = inner.next_member_seq(year);

        let member = Member {
            id: record.member_id,
            number: MemberNumber::new(year, seq),
            email: current.applicant.email.clone(),
            full_name: current.applicant.full_name(),
            user_id: Some(record.new_user.id),
            kind: record.member_kind,
            is_active: true,
            joined_at: record.occurred_at,
            created_from: current.id,
        };

        let from = current.status;
        let mut updated = current;
        updated.status = RequestStatus::Approved;
        updated.decided_by = Some(record.actor);
        updated.decided_at = Some(record.occurred_at);
        updated.decision_notes = record.notes.clone();
        updated.member_id = Some(member.id);

        inner.push_history(
            &StatusChange {
                request_id: record.request_id,
                to: RequestStatus::Approved,
                actor: record.actor,
                notes: record.notes.clone(),
                occurred_at: record.occurred_at,
            },
            from,
        );
        inner.users.insert(record.new_user.id, record.new_user.clone());
        inner.members.insert(member.id, member.clone());
        inner.requests.insert(updated.id, updated.clone());

        Ok((updated, member, record.new_user))
    }

    async fn commit_account_creation(
        &self,
        record: AccountCreationRecord,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        let member = inner
            .members
            .get(&record.member_id)
            .ok_or(StoreError::NotFound)?
            .clone();

        if member.user_id.is_some() {
            return Err(StoreError::Conflict(
                "member already has a linked account".to_string(),
            ));
        }
        if inner
            .users
            .values()
            .any(|u| u.email == record.new_user.email)
        {
            return Err(StoreError::Conflict(
                "email already belongs to a user".to_string(),
            ));
        }

        let mut linked = member;
        linked.user_id = Some(record.new_user.id);
        inner.users.insert(record.new_user.id, record.new_user.clone());
        inner.members.insert(linked.id, linked);

        Ok(record.new_user)
    }

    async fn delete_pending_request(&self, id: RequestId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        let current = inner.requests.get(&id).ok_or(StoreError::NotFound)?;
        if current.status != RequestStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "request is {}",
                current.status
            )));
        }

        inner.requests.remove(&id);
        inner.history.retain(|h| h.request_id != id);
        Ok(())
    }

    async fn request_history(
        &self,
        id: RequestId,
    ) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner
            .history
            .iter()
            .filter(|h| h.request_id == id)
            .cloned()
            .collect())
    }

    async fn get_member(&self, id: MemberId) -> Result<Option<Member>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.members.get(&id).cloned())
    }

    async fn list_members(&self, page: Pagination) -> Result<Vec<Member>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;

        let mut rows: Vec<Member> = inner.members.values().cloned().collect();
        rows.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));

        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.members.values().find(|m| m.email == email).cloned())
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(
                "email already belongs to a user".to_string(),
            ));
        }

        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, page: Pagination) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;

        let mut rows: Vec<User> = inner.users.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn update_user_role(
        &self,
        id: UserId,
        role: Role,
        is_board_member: bool,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.role = role;
        user.is_board_member = is_board_member;
        Ok(user.clone())
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<User, StoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_active = active;
        Ok(user.clone())
    }

    async fn count_active_admins(&self) -> Result<u64, StoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner
            .users
            .values()
            .filter(|u| u.role == Role::Admin && u.is_active)
            .count() as u64)
    }
}
