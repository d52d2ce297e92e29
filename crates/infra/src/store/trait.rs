use chrono::{DateTime, Utc};
use thiserror::Error;

use medlem_auth::{Role, User};
use medlem_core::{MemberId, Pagination, RequestId, UserId};
use medlem_membership::{
    ApplicantDetails, ApprovalTrack, Member, MembershipKind, MembershipRequest, RequestStatus,
    StatusHistoryEntry,
};

/// Store operation error.
///
/// These are **infrastructure** outcomes. `Conflict` covers both constraint
/// races (unique email, terminal-state races) and guard failures detected
/// inside a transaction; the engine re-reads state to translate a conflict
/// into the precise business error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("row decoding failed: {0}")]
    Serialization(String),
}

/// Input for persisting a new request. The applicant is already validated
/// and email-normalized; the store allocates the request number.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub id: RequestId,
    pub applicant: ApplicantDetails,
    pub kind: MembershipKind,
    pub track: ApprovalTrack,
    pub submitted_by: Option<UserId>,
    pub submitted_at: DateTime<Utc>,
}

/// One status change to apply atomically together with its history row.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub request_id: RequestId,
    pub to: RequestStatus,
    pub actor: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Everything the approval transaction writes. The store allocates the
/// member number and assembles the member row; the engine supplies the
/// fully-built user (password already hashed).
#[derive(Debug, Clone)]
pub struct ApprovalRecord {
    pub request_id: RequestId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub member_id: MemberId,
    pub member_kind: MembershipKind,
    pub new_user: User,
}

/// Account provisioning for an already-approved member.
#[derive(Debug, Clone)]
pub struct AccountCreationRecord {
    pub member_id: MemberId,
    pub new_user: User,
}

/// Persistence contract for the membership lifecycle.
///
/// ## Atomicity requirements
///
/// - `insert_request` allocates the next `REQ-<year>-<seq>` and persists the
///   row as one unit; two concurrent calls in the same year must never
///   produce the same number.
/// - `update_status` writes the status change and its history entry
///   together, and must refuse (with `Conflict`) if the row reached a
///   terminal state since the caller last read it.
/// - `commit_approval` allocates the `M<year>-<seq>` member number and
///   inserts the user, inserts the member, updates the request and appends
///   the history row in one transaction. A failure at any step leaves no
///   partial writes visible.
/// - `commit_account_creation` inserts the user and links the member in one
///   transaction, refusing with `Conflict` if a link already exists.
/// - `delete_pending_request` deletes only while the request is still
///   PENDING (`Conflict` otherwise).
///
/// Implementations hold no cross-request state in memory; concurrent callers
/// are serialized only by the backing storage.
#[async_trait::async_trait]
pub trait MembershipStore: Send + Sync {
    // ── Requests ────────────────────────────────────────────────────────────

    async fn insert_request(&self, request: NewRequest) -> Result<MembershipRequest, StoreError>;

    async fn get_request(&self, id: RequestId) -> Result<Option<MembershipRequest>, StoreError>;

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
        page: Pagination,
    ) -> Result<Vec<MembershipRequest>, StoreError>;

    /// Find a request that blocks a new application for `email`: any open
    /// request or an approved one.
    async fn find_blocking_request_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MembershipRequest>, StoreError>;

    async fn update_status(&self, change: StatusChange) -> Result<MembershipRequest, StoreError>;

    async fn commit_approval(
        &self,
        record: ApprovalRecord,
    ) -> Result<(MembershipRequest, Member, User), StoreError>;

    async fn commit_account_creation(
        &self,
        record: AccountCreationRecord,
    ) -> Result<User, StoreError>;

    async fn delete_pending_request(&self, id: RequestId) -> Result<(), StoreError>;

    async fn request_history(
        &self,
        id: RequestId,
    ) -> Result<Vec<StatusHistoryEntry>, StoreError>;

    // ── Members ─────────────────────────────────────────────────────────────

    async fn get_member(&self, id: MemberId) -> Result<Option<Member>, StoreError>;

    async fn list_members(&self, page: Pagination) -> Result<Vec<Member>, StoreError>;

    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError>;

    // ── Users ───────────────────────────────────────────────────────────────

    async fn insert_user(&self, user: User) -> Result<User, StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self, page: Pagination) -> Result<Vec<User>, StoreError>;

    async fn update_user_role(
        &self,
        id: UserId,
        role: Role,
        is_board_member: bool,
    ) -> Result<User, StoreError>;

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<User, StoreError>;

    async fn count_active_admins(&self) -> Result<u64, StoreError>;
}
