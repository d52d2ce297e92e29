//! Membership engine: the one place lifecycle operations are orchestrated.
//!
//! Every operation follows the same shape: pure domain guards first, then a
//! single atomic store call, then best-effort side effects (activity ledger,
//! notifications). Side effects run strictly after the mutation committed
//! and their failures never propagate.
//!
//! The engine holds no mutable state of its own; all collaborators are
//! injected, so it is safely shareable across concurrent requests.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use medlem_audit::{ActivityEntry, ActivityFilter, ActivityLedger, LedgerError};
use medlem_auth::{
    hash_password, CredentialError, NewUser, Role, TemporaryPassword, User,
};
use medlem_core::{DomainError, MemberId, Pagination, RequestId, UserId};
use medlem_membership::{
    ApplicantDetails, ApprovalTrack, Member, MembershipError, MembershipKind, MembershipRequest,
    RequestStatus, StatusHistoryEntry,
};
use medlem_notify::{templates, EmailMessage, Mailer};

use crate::store::{
    AccountCreationRecord, ApprovalRecord, MembershipStore, NewRequest, StatusChange, StoreError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Engine operation error.
///
/// Business outcomes carry their membership error kind so the boundary layer
/// can map each one to a machine-readable reason code; `Store` is the only
/// retryable variant.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The acting identity is not allowed to touch this resource.
    #[error("unauthorized")]
    Unauthorized,

    /// Email collides with an existing account.
    #[error("email already in use by another account")]
    EmailInUse,

    /// Demoting or deactivating the last active administrator.
    #[error("the last active administrator cannot be demoted or deactivated")]
    LastAdmin,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// Infrastructure failure; the operation was rolled back and may be
    /// retried.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs / outputs
// ─────────────────────────────────────────────────────────────────────────────

/// Input for submitting a membership application.
#[derive(Debug, Clone)]
pub struct SubmitInput {
    pub applicant: ApplicantDetails,
    pub kind: MembershipKind,
    pub track: ApprovalTrack,
    /// Authenticated submitter, when the application came from a logged-in
    /// session.
    pub submitted_by: Option<UserId>,
}

/// Input for admin user provisioning.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub is_board_member: bool,
}

/// Result of a successful approval.
///
/// `temporary_password` is the only copy of the plaintext; it has already
/// been dispatched to the applicant and is returned for the caller's
/// response handling only.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub request: MembershipRequest,
    pub member: Member,
    pub user: User,
    pub temporary_password: TemporaryPassword,
}

/// Result of admin user provisioning.
#[derive(Debug)]
pub struct CreatedUser {
    pub user: User,
    pub temporary_password: TemporaryPassword,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MembershipEngine {
    store: Arc<dyn MembershipStore>,
    ledger: Arc<dyn ActivityLedger>,
    mailer: Arc<dyn Mailer>,
}

impl MembershipEngine {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        ledger: Arc<dyn ActivityLedger>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            ledger,
            mailer,
        }
    }

    // ── Requests ────────────────────────────────────────────────────────────

    /// Submit a new application.
    ///
    /// Rejects with `DuplicateApplication` when the email already has an open
    /// or approved request, or already belongs to a member. The request
    /// number is allocated inside the store's transaction.
    pub async fn submit(&self, mut input: SubmitInput) -> Result<MembershipRequest, EngineError> {
        input.applicant.validate()?;

        if self
            .store
            .find_blocking_request_by_email(&input.applicant.email)
            .await?
            .is_some()
        {
            return Err(MembershipError::DuplicateApplication.into());
        }
        if self
            .store
            .find_member_by_email(&input.applicant.email)
            .await?
            .is_some()
        {
            return Err(MembershipError::DuplicateApplication.into());
        }

        let new_request = NewRequest {
            id: RequestId::new(),
            applicant: input.applicant,
            kind: input.kind,
            track: input.track,
            submitted_by: input.submitted_by,
            submitted_at: Utc::now(),
        };

        let request = self.store.insert_request(new_request).await.map_err(|e| {
            // The store's unique constraints double as the duplicate check
            // under concurrent submissions.
            match e {
                StoreError::Conflict(_) => MembershipError::DuplicateApplication.into(),
                other => EngineError::Store(other),
            }
        })?;

        if let Some(actor) = request.submitted_by {
            self.ledger
                .record(
                    ActivityEntry::new(
                        actor,
                        "membership_request.submit",
                        "membership_request",
                        format!("submitted application {}", request.number),
                    )
                    .with_resource_id(&request.number)
                    .with_after(json!({ "status": request.status })),
                )
                .await;
        }

        tracing::info!(number = %request.number, "membership request submitted");
        Ok(request)
    }

    /// Move a request along the review lifecycle.
    ///
    /// Approval is deliberately not reachable through this path: it has its
    /// own operation because it creates the member and account records.
    pub async fn transition_status(
        &self,
        request_id: RequestId,
        to: RequestStatus,
        actor: UserId,
        notes: Option<String>,
    ) -> Result<MembershipRequest, EngineError> {
        if to == RequestStatus::Approved {
            return Err(MembershipError::validation(
                "approval must go through the approve operation",
            )
            .into());
        }

        let request = self.load_request(request_id).await?;
        request.ensure_transition(to)?;

        let change = StatusChange {
            request_id,
            to,
            actor,
            notes,
            occurred_at: Utc::now(),
        };

        let updated = match self.store.update_status(change).await {
            Ok(updated) => updated,
            Err(e) => return Err(self.terminal_or_store(request_id, e).await),
        };

        self.ledger
            .record(
                ActivityEntry::new(
                    actor,
                    "membership_request.transition",
                    "membership_request",
                    format!("{} -> {}", request.status, updated.status),
                )
                .with_resource_id(&updated.number)
                .with_before(json!({ "status": request.status }))
                .with_after(json!({ "status": updated.status })),
            )
            .await;

        Ok(updated)
    }

    /// Approve a request: one transaction creates the member, the login
    /// account and the terminal status change, then the approval and
    /// credentials notices go out best-effort.
    pub async fn approve(
        &self,
        request_id: RequestId,
        actor: UserId,
        notes: Option<String>,
    ) -> Result<ApprovalOutcome, EngineError> {
        let request = self.load_request(request_id).await?;
        request.ensure_approvable()?;

        if self
            .store
            .find_member_by_email(&request.applicant.email)
            .await?
            .is_some()
        {
            return Err(MembershipError::EmailAlreadyMember.into());
        }

        let temporary_password = TemporaryPassword::generate();
        let password_hash = hash_password(temporary_password.expose())?;
        let now = Utc::now();

        let new_user = NewUser {
            id: UserId::new(),
            email: request.applicant.email.clone(),
            display_name: Some(request.applicant.full_name()),
            password_hash,
            role: Role::User,
            is_board_member: false,
        }
        .into_user(now)?;

        let record = ApprovalRecord {
            request_id,
            actor,
            occurred_at: now,
            notes,
            member_id: MemberId::new(),
            member_kind: request.kind,
            new_user,
        };

        let (updated, member, user) = match self.store.commit_approval(record).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(self
                    .approval_conflict(request_id, &request.applicant.email, e)
                    .await)
            }
        };

        self.ledger
            .record(
                ActivityEntry::new(
                    actor,
                    "membership_request.approve",
                    "membership_request",
                    format!(
                        "approved {} as member {}",
                        updated.number, member.number
                    ),
                )
                .with_resource_id(&updated.number)
                .with_before(json!({ "status": request.status }))
                .with_after(json!({
                    "status": updated.status,
                    "member_number": member.number,
                })),
            )
            .await;

        self.dispatch(
            templates::approval_notice(&member.email, &member.full_name, member.number.as_str()),
            "approval notice",
        )
        .await;
        self.dispatch(
            templates::credentials_notice(
                &member.email,
                &user.email,
                temporary_password.expose(),
            ),
            "credentials notice",
        )
        .await;

        tracing::info!(
            request = %updated.number,
            member = %member.number,
            "membership request approved"
        );

        Ok(ApprovalOutcome {
            request: updated,
            member,
            user,
            temporary_password,
        })
    }

    /// Reject a request, recording the reason.
    pub async fn reject(
        &self,
        request_id: RequestId,
        actor: UserId,
        reason: String,
    ) -> Result<MembershipRequest, EngineError> {
        let request = self.load_request(request_id).await?;
        request.ensure_transition(RequestStatus::Rejected)?;

        let change = StatusChange {
            request_id,
            to: RequestStatus::Rejected,
            actor,
            notes: Some(reason),
            occurred_at: Utc::now(),
        };

        let updated = match self.store.update_status(change).await {
            Ok(updated) => updated,
            Err(e) => return Err(self.terminal_or_store(request_id, e).await),
        };

        self.ledger
            .record(
                ActivityEntry::new(
                    actor,
                    "membership_request.reject",
                    "membership_request",
                    format!("rejected {}", updated.number),
                )
                .with_resource_id(&updated.number)
                .with_before(json!({ "status": request.status }))
                .with_after(json!({ "status": updated.status })),
            )
            .await;

        Ok(updated)
    }

    /// Withdraw a pending application. Only the authenticated submitter may
    /// withdraw, and only before any decision work started; this is the one
    /// legal hard-delete path for requests.
    pub async fn withdraw(
        &self,
        request_id: RequestId,
        requester: UserId,
    ) -> Result<(), EngineError> {
        let request = self.load_request(request_id).await?;

        if !request.is_submitted_by(requester) {
            return Err(EngineError::Unauthorized);
        }
        request.ensure_pending()?;

        match self.store.delete_pending_request(request_id).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(MembershipError::NotPending.into());
            }
            Err(StoreError::NotFound) => return Err(MembershipError::NotFound.into()),
            Err(other) => return Err(other.into()),
        }

        self.ledger
            .record(
                ActivityEntry::new(
                    requester,
                    "membership_request.withdraw",
                    "membership_request",
                    format!("withdrew application {}", request.number),
                )
                .with_resource_id(&request.number)
                .with_before(json!({ "status": request.status })),
            )
            .await;

        Ok(())
    }

    /// Remediation path: provision the login account for an approved member
    /// whose account creation failed or was skipped. Independently
    /// retryable; re-sends the credentials notice.
    pub async fn create_account_for_approved_member(
        &self,
        request_id: RequestId,
        actor: UserId,
    ) -> Result<User, EngineError> {
        let request = self.load_request(request_id).await?;
        request.ensure_approved()?;

        let member_id = request.member_id.ok_or_else(|| {
            EngineError::Store(StoreError::Backend(
                "approved request has no member link".to_string(),
            ))
        })?;

        let member = self
            .store
            .get_member(member_id)
            .await?
            .ok_or_else(|| {
                EngineError::Store(StoreError::Backend(
                    "approved request points at a missing member".to_string(),
                ))
            })?;

        if member.has_account() {
            return Err(MembershipError::AccountAlreadyExists.into());
        }
        if self.store.find_user_by_email(&member.email).await?.is_some() {
            return Err(EngineError::EmailInUse);
        }

        let temporary_password = TemporaryPassword::generate();
        let password_hash = hash_password(temporary_password.expose())?;

        let new_user = NewUser {
            id: UserId::new(),
            email: member.email.clone(),
            display_name: Some(member.full_name.clone()),
            password_hash,
            role: Role::User,
            is_board_member: false,
        }
        .into_user(Utc::now())?;

        let user = match self
            .store
            .commit_account_creation(AccountCreationRecord {
                member_id,
                new_user,
            })
            .await
        {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => {
                return Err(MembershipError::AccountAlreadyExists.into());
            }
            Err(other) => return Err(other.into()),
        };

        self.ledger
            .record(
                ActivityEntry::new(
                    actor,
                    "member.create_account",
                    "member",
                    format!("created login account for member {}", member.number),
                )
                .with_resource_id(&member.number)
                .with_after(json!({ "user_id": user.id })),
            )
            .await;

        self.dispatch(
            templates::credentials_notice(&member.email, &user.email, temporary_password.expose()),
            "credentials notice",
        )
        .await;

        Ok(user)
    }

    pub async fn get_request(&self, id: RequestId) -> Result<MembershipRequest, EngineError> {
        self.load_request(id).await
    }

    pub async fn list_requests(
        &self,
        status: Option<RequestStatus>,
        page: Pagination,
    ) -> Result<Vec<MembershipRequest>, EngineError> {
        Ok(self.store.list_requests(status, page).await?)
    }

    pub async fn request_history(
        &self,
        id: RequestId,
    ) -> Result<Vec<StatusHistoryEntry>, EngineError> {
        // Surface NotFound for unknown requests instead of an empty history.
        self.load_request(id).await?;
        Ok(self.store.request_history(id).await?)
    }

    // ── Members ─────────────────────────────────────────────────────────────

    pub async fn get_member(&self, id: MemberId) -> Result<Member, EngineError> {
        self.store
            .get_member(id)
            .await?
            .ok_or(EngineError::NotFound)
    }

    pub async fn list_members(&self, page: Pagination) -> Result<Vec<Member>, EngineError> {
        Ok(self.store.list_members(page).await?)
    }

    // ── Users ───────────────────────────────────────────────────────────────

    /// Admin provisioning: create an account with a generated temporary
    /// password and send the credentials notice.
    pub async fn create_user(
        &self,
        input: CreateUserInput,
        actor: UserId,
    ) -> Result<CreatedUser, EngineError> {
        let temporary_password = TemporaryPassword::generate();
        let password_hash = hash_password(temporary_password.expose())?;

        let user = NewUser {
            id: UserId::new(),
            email: input.email,
            display_name: input.display_name,
            password_hash,
            role: input.role,
            is_board_member: input.is_board_member,
        }
        .into_user(Utc::now())?;

        let user = match self.store.insert_user(user).await {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => return Err(EngineError::EmailInUse),
            Err(other) => return Err(other.into()),
        };

        self.ledger
            .record(
                ActivityEntry::new(
                    actor,
                    "user.create",
                    "user",
                    format!("provisioned account {}", user.email),
                )
                .with_resource_id(user.id)
                .with_after(json!({ "role": user.role, "is_board_member": user.is_board_member })),
            )
            .await;

        self.dispatch(
            templates::credentials_notice(&user.email, &user.email, temporary_password.expose()),
            "credentials notice",
        )
        .await;

        Ok(CreatedUser {
            user,
            temporary_password,
        })
    }

    /// Change a user's role and board flag. Demoting the last active admin
    /// is refused.
    pub async fn change_user_role(
        &self,
        user_id: UserId,
        role: Role,
        is_board_member: bool,
        actor: UserId,
    ) -> Result<User, EngineError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let demoting_admin = user.role == Role::Admin && user.is_active && role != Role::Admin;
        if demoting_admin && self.store.count_active_admins().await? <= 1 {
            return Err(EngineError::LastAdmin);
        }

        let updated = self
            .store
            .update_user_role(user_id, role, is_board_member)
            .await?;

        self.ledger
            .record(
                ActivityEntry::new(
                    actor,
                    "user.change_role",
                    "user",
                    format!("changed role of {}", updated.email),
                )
                .with_resource_id(updated.id)
                .with_before(json!({ "role": user.role, "is_board_member": user.is_board_member }))
                .with_after(json!({
                    "role": updated.role,
                    "is_board_member": updated.is_board_member,
                })),
            )
            .await;

        Ok(updated)
    }

    /// Activate or deactivate an account. Deactivating the last active
    /// admin is refused; accounts are never hard-deleted.
    pub async fn set_user_active(
        &self,
        user_id: UserId,
        active: bool,
        actor: UserId,
    ) -> Result<User, EngineError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let deactivating_admin = user.role == Role::Admin && user.is_active && !active;
        if deactivating_admin && self.store.count_active_admins().await? <= 1 {
            return Err(EngineError::LastAdmin);
        }

        let updated = self.store.set_user_active(user_id, active).await?;

        let action = if active { "user.activate" } else { "user.deactivate" };
        self.ledger
            .record(
                ActivityEntry::new(actor, action, "user", format!("{} {}", action, updated.email))
                    .with_resource_id(updated.id)
                    .with_before(json!({ "is_active": user.is_active }))
                    .with_after(json!({ "is_active": updated.is_active })),
            )
            .await;

        Ok(updated)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, EngineError> {
        self.store.get_user(id).await?.ok_or(EngineError::NotFound)
    }

    pub async fn list_users(&self, page: Pagination) -> Result<Vec<User>, EngineError> {
        Ok(self.store.list_users(page).await?)
    }

    // ── Activity ────────────────────────────────────────────────────────────

    pub async fn record_activity(&self, entry: ActivityEntry) {
        self.ledger.record(entry).await;
    }

    pub async fn query_activity(
        &self,
        filter: ActivityFilter,
        page: Pagination,
    ) -> Result<Vec<ActivityEntry>, LedgerError> {
        self.ledger.query(filter, page).await
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    async fn load_request(&self, id: RequestId) -> Result<MembershipRequest, EngineError> {
        self.store
            .get_request(id)
            .await?
            .ok_or_else(|| MembershipError::NotFound.into())
    }

    /// Translate a store conflict on a status change into the precise
    /// business error by re-reading the row: a concurrent decision makes it
    /// `AlreadyTerminal`.
    async fn terminal_or_store(&self, id: RequestId, err: StoreError) -> EngineError {
        if matches!(err, StoreError::Conflict(_)) {
            if let Ok(Some(request)) = self.store.get_request(id).await {
                if request.status.is_terminal() {
                    return MembershipError::AlreadyTerminal(request.status).into();
                }
            }
        }
        if matches!(err, StoreError::NotFound) {
            return MembershipError::NotFound.into();
        }
        EngineError::Store(err)
    }

    /// Like [`Self::terminal_or_store`], but an approval can also lose an
    /// email race against a concurrent approval of a duplicate.
    async fn approval_conflict(
        &self,
        id: RequestId,
        email: &str,
        err: StoreError,
    ) -> EngineError {
        if matches!(err, StoreError::Conflict(_)) {
            if let Ok(Some(request)) = self.store.get_request(id).await {
                if request.status.is_terminal() {
                    return MembershipError::AlreadyTerminal(request.status).into();
                }
            }
            if let Ok(Some(_)) = self.store.find_member_by_email(email).await {
                return MembershipError::EmailAlreadyMember.into();
            }
            if let Ok(Some(_)) = self.store.find_user_by_email(email).await {
                return MembershipError::EmailAlreadyMember.into();
            }
        }
        if matches!(err, StoreError::NotFound) {
            return MembershipError::NotFound.into();
        }
        EngineError::Store(err)
    }

    async fn dispatch(&self, message: EmailMessage, what: &str) {
        if let Err(e) = self.mailer.send(&message).await {
            tracing::warn!(
                error = %e,
                notice = what,
                to = %message.to,
                "notification delivery failed; operation already committed"
            );
        }
    }
}
