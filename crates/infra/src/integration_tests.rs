//! Engine integration tests against the in-memory store.

use std::sync::Arc;

use chrono::{Datelike, Utc};

use medlem_audit::{ActivityFilter, ActivityLedger, InMemoryLedger};
use medlem_auth::{verify_password, Role, User};
use medlem_core::{MemberId, Pagination, RequestId, UserId};
use medlem_membership::{
    ApplicantDetails, ApprovalTrack, Member, MembershipError, MembershipKind, MembershipRequest,
    RequestStatus, StatusHistoryEntry,
};
use medlem_notify::RecordingMailer;

use crate::engine::{CreateUserInput, EngineError, MembershipEngine, SubmitInput};
use crate::store::{
    AccountCreationRecord, ApprovalRecord, InMemoryStore, MembershipStore, NewRequest,
    StatusChange, StoreError,
};

struct Harness {
    engine: MembershipEngine,
    ledger: Arc<InMemoryLedger>,
    mailer: Arc<RecordingMailer>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let mailer = Arc::new(RecordingMailer::new());
    let engine = MembershipEngine::new(store, ledger.clone(), mailer.clone());
    Harness {
        engine,
        ledger,
        mailer,
    }
}

fn applicant(email: &str) -> ApplicantDetails {
    ApplicantDetails {
        first_name: "Dara".to_string(),
        last_name: "Svensson".to_string(),
        email: email.to_string(),
        phone: Some("+46701234567".to_string()),
        street: "Storgatan 1".to_string(),
        postal_code: "21145".to_string(),
        city: "Malmö".to_string(),
        motivation: "I want to help the community".to_string(),
    }
}

fn submit_input(email: &str) -> SubmitInput {
    SubmitInput {
        applicant: applicant(email),
        kind: MembershipKind::Individual,
        track: ApprovalTrack::Standard,
        submitted_by: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Submission & numbering
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_allocates_year_scoped_sequential_numbers() {
    let h = harness();
    let year = Utc::now().year();

    let first = h.engine.submit(submit_input("a@x.se")).await.unwrap();
    let second = h.engine.submit(submit_input("b@x.se")).await.unwrap();

    assert_eq!(first.number.as_str(), format!("REQ-{year}-001"));
    assert_eq!(second.number.as_str(), format!("REQ-{year}-002"));
    assert_eq!(first.status, RequestStatus::Pending);
}

#[tokio::test]
async fn duplicate_application_is_rejected_and_creates_no_row() {
    let h = harness();

    h.engine.submit(submit_input("a@x.se")).await.unwrap();
    let err = h.engine.submit(submit_input("a@x.se")).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::DuplicateApplication)
    ));

    let all = h
        .engine
        .list_requests(None, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn duplicate_check_normalizes_email_case() {
    let h = harness();

    h.engine.submit(submit_input("a@x.se")).await.unwrap();
    let err = h
        .engine
        .submit(submit_input("  A@X.SE "))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::DuplicateApplication)
    ));
}

#[tokio::test]
async fn submit_validates_applicant_fields() {
    let h = harness();

    let mut input = submit_input("a@x.se");
    input.applicant.motivation = "too short".to_string();
    assert!(matches!(
        h.engine.submit(input).await.unwrap_err(),
        EngineError::Membership(MembershipError::Validation(_))
    ));

    let mut input = submit_input("not-an-email");
    input.applicant.email = "not-an-email".to_string();
    assert!(matches!(
        h.engine.submit(input).await.unwrap_err(),
        EngineError::Membership(MembershipError::Validation(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_get_unique_monotonic_numbers() {
    let h = harness();
    let year = Utc::now().year();

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            engine.submit(submit_input(&format!("user{i}@x.se"))).await
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        let request = handle.await.unwrap().unwrap();
        numbers.push(request.number);
    }

    let mut seqs: Vec<u32> = numbers.iter().map(|n| n.seq()).collect();
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs.len(), 8, "request numbers must be unique");
    assert_eq!(seqs, (1..=8).collect::<Vec<u32>>());
    for number in &numbers {
        assert_eq!(number.year(), year);
        assert!(number.as_str().starts_with("REQ-"));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Approval
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_submit_then_approve_then_reject_fails() {
    let h = harness();
    let year = Utc::now().year();
    let admin = UserId::new();

    let request = h.engine.submit(submit_input("a@x.se")).await.unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.number.as_str(), format!("REQ-{year}-001"));

    let outcome = h.engine.approve(request.id, admin, None).await.unwrap();

    assert_eq!(outcome.member.number.as_str(), format!("M{year}-001"));
    assert_eq!(outcome.member.email, "a@x.se");
    assert_eq!(outcome.user.role, Role::User);
    assert!(outcome.user.is_active);
    assert_eq!(outcome.request.status, RequestStatus::Approved);
    assert_eq!(outcome.request.member_id, Some(outcome.member.id));
    assert_eq!(outcome.member.user_id, Some(outcome.user.id));

    // The returned plaintext matches the stored hash.
    assert!(verify_password(
        outcome.temporary_password.expose(),
        &outcome.user.password_hash
    )
    .unwrap());

    // Approval and credentials notices both went out.
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.to == "a@x.se"));
    assert!(sent[1]
        .text_body
        .contains(outcome.temporary_password.expose()));

    // Terminal state absorbs the follow-up rejection.
    let err = h
        .engine
        .reject(request.id, admin, "changed our mind".to_string())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::AlreadyTerminal(RequestStatus::Approved))
    ));
}

#[tokio::test]
async fn terminal_states_absorb_every_mutation() {
    let h = harness();
    let admin = UserId::new();
    let submitter = UserId::new();

    let mut input = submit_input("a@x.se");
    input.submitted_by = Some(submitter);
    let request = h.engine.submit(input).await.unwrap();

    h.engine.approve(request.id, admin, None).await.unwrap();

    let err = h
        .engine
        .transition_status(request.id, RequestStatus::UnderReview, admin, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::AlreadyTerminal(_))
    ));

    let err = h.engine.approve(request.id, admin, None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::AlreadyTerminal(_))
    ));

    let err = h.engine.withdraw(request.id, submitter).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::NotPending)
    ));

    // State unchanged.
    let current = h.engine.get_request(request.id).await.unwrap();
    assert_eq!(current.status, RequestStatus::Approved);
}

#[tokio::test]
async fn board_vote_track_cannot_be_approved_by_single_actor() {
    let h = harness();

    let mut input = submit_input("a@x.se");
    input.track = ApprovalTrack::BoardVote;
    let request = h.engine.submit(input).await.unwrap();

    let err = h
        .engine
        .approve(request.id, UserId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::WrongApprovalTrack)
    ));
}

#[tokio::test]
async fn submitting_after_approval_is_still_a_duplicate() {
    let h = harness();
    let admin = UserId::new();

    let first = h.engine.submit(submit_input("a@x.se")).await.unwrap();
    h.engine.approve(first.id, admin, None).await.unwrap();

    // APPROVED requests (and the member they created) keep blocking.
    let err = h.engine.submit(submit_input("a@x.se")).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::DuplicateApplication)
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure injection
// ─────────────────────────────────────────────────────────────────────────────

/// Delegating store with two rigging knobs: fail the approval transaction
/// outright, or pretend a member already exists for some email (the race a
/// concurrent approval of a duplicate would produce).
#[derive(Default)]
struct Rigging {
    fail_approvals: bool,
    fake_member: Option<Member>,
}

struct RiggedStore {
    inner: InMemoryStore,
    rigging: std::sync::Mutex<Rigging>,
}

impl RiggedStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            rigging: std::sync::Mutex::new(Rigging::default()),
        }
    }
}

#[async_trait::async_trait]
impl MembershipStore for RiggedStore {
    async fn insert_request(&self, request: NewRequest) -> Result<MembershipRequest, StoreError> {
        self.inner.insert_request(request).await
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<MembershipRequest>, StoreError> {
        self.inner.get_request(id).await
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
        page: Pagination,
    ) -> Result<Vec<MembershipRequest>, StoreError> {
        self.inner.list_requests(status, page).await
    }

    async fn find_blocking_request_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MembershipRequest>, StoreError> {
        self.inner.find_blocking_request_by_email(email).await
    }

    async fn update_status(&self, change: StatusChange) -> Result<MembershipRequest, StoreError> {
        self.inner.update_status(change).await
    }

    async fn commit_approval(
        &self,
        record: ApprovalRecord,
    ) -> Result<(MembershipRequest, Member, User), StoreError> {
        if self.rigging.lock().unwrap().fail_approvals {
            // Nothing is applied: the contract is all-or-nothing.
            return Err(StoreError::Backend("injected failure".to_string()));
        }
        self.inner.commit_approval(record).await
    }

    async fn commit_account_creation(
        &self,
        record: AccountCreationRecord,
    ) -> Result<User, StoreError> {
        self.inner.commit_account_creation(record).await
    }

    async fn delete_pending_request(&self, id: RequestId) -> Result<(), StoreError> {
        self.inner.delete_pending_request(id).await
    }

    async fn request_history(
        &self,
        id: RequestId,
    ) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        self.inner.request_history(id).await
    }

    async fn get_member(&self, id: MemberId) -> Result<Option<Member>, StoreError> {
        self.inner.get_member(id).await
    }

    async fn list_members(&self, page: Pagination) -> Result<Vec<Member>, StoreError> {
        self.inner.list_members(page).await
    }

    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
        if let Some(fake) = self.rigging.lock().unwrap().fake_member.as_ref() {
            if fake.email == email {
                return Ok(Some(fake.clone()));
            }
        }
        self.inner.find_member_by_email(email).await
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        self.inner.insert_user(user).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.get_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_email(email).await
    }

    async fn list_users(&self, page: Pagination) -> Result<Vec<User>, StoreError> {
        self.inner.list_users(page).await
    }

    async fn update_user_role(
        &self,
        id: UserId,
        role: Role,
        is_board_member: bool,
    ) -> Result<User, StoreError> {
        self.inner.update_user_role(id, role, is_board_member).await
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<User, StoreError> {
        self.inner.set_user_active(id, active).await
    }

    async fn count_active_admins(&self) -> Result<u64, StoreError> {
        self.inner.count_active_admins().await
    }
}

#[tokio::test]
async fn failed_approval_leaves_no_partial_state() {
    let store = Arc::new(RiggedStore::new());
    let engine = MembershipEngine::new(
        store.clone(),
        Arc::new(InMemoryLedger::new()),
        Arc::new(RecordingMailer::new()),
    );

    let request = engine.submit(submit_input("a@x.se")).await.unwrap();
    store.rigging.lock().unwrap().fail_approvals = true;

    let err = engine
        .approve(request.id, UserId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));

    // No user, no member, request still pending.
    assert!(store.find_user_by_email("a@x.se").await.unwrap().is_none());
    assert!(store.find_member_by_email("a@x.se").await.unwrap().is_none());
    let current = store.get_request(request.id).await.unwrap().unwrap();
    assert_eq!(current.status, RequestStatus::Pending);
}

#[tokio::test]
async fn approval_loses_race_against_concurrent_duplicate_approval() {
    let store = Arc::new(RiggedStore::new());
    let engine = MembershipEngine::new(
        store.clone(),
        Arc::new(InMemoryLedger::new()),
        Arc::new(RecordingMailer::new()),
    );

    let request = engine.submit(submit_input("a@x.se")).await.unwrap();

    // A concurrent approval elsewhere made this email a member.
    store.rigging.lock().unwrap().fake_member = Some(Member {
        id: MemberId::new(),
        number: medlem_membership::MemberNumber::new(Utc::now().year(), 99),
        email: "a@x.se".to_string(),
        full_name: "Dara Svensson".to_string(),
        user_id: None,
        kind: MembershipKind::Individual,
        is_active: true,
        joined_at: Utc::now(),
        created_from: RequestId::new(),
    });

    let err = engine
        .approve(request.id, UserId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::EmailAlreadyMember)
    ));

    // Nothing was committed for this request.
    let current = store.get_request(request.id).await.unwrap().unwrap();
    assert_eq!(current.status, RequestStatus::Pending);
}

// ─────────────────────────────────────────────────────────────────────────────
// Review transitions & history
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transitions_are_validated_and_recorded() {
    let h = harness();
    let reviewer = UserId::new();

    let request = h.engine.submit(submit_input("a@x.se")).await.unwrap();

    // Pending cannot skip straight into info-requested.
    let err = h
        .engine
        .transition_status(
            request.id,
            RequestStatus::AdditionalInfoRequested,
            reviewer,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::InvalidStateTransition { .. })
    ));

    let updated = h
        .engine
        .transition_status(
            request.id,
            RequestStatus::UnderReview,
            reviewer,
            Some("taking a look".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, RequestStatus::UnderReview);

    let history = h.engine.request_history(request.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, RequestStatus::Pending);
    assert_eq!(history[0].to, RequestStatus::UnderReview);
    assert_eq!(history[0].actor, reviewer);
    assert_eq!(history[0].notes.as_deref(), Some("taking a look"));
}

#[tokio::test]
async fn approval_is_not_reachable_through_generic_transition() {
    let h = harness();

    let request = h.engine.submit(submit_input("a@x.se")).await.unwrap();
    let err = h
        .engine
        .transition_status(request.id, RequestStatus::Approved, UserId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::Validation(_))
    ));
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let h = harness();
    let err = h.engine.get_request(RequestId::new()).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::NotFound)
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Withdrawal
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn withdraw_is_applicant_only_and_hard_deletes() {
    let h = harness();
    let submitter = UserId::new();

    let mut input = submit_input("a@x.se");
    input.submitted_by = Some(submitter);
    let request = h.engine.submit(input).await.unwrap();

    let err = h
        .engine
        .withdraw(request.id, UserId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));

    h.engine.withdraw(request.id, submitter).await.unwrap();

    let err = h.engine.get_request(request.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::NotFound)
    ));
}

#[tokio::test]
async fn withdraw_refused_once_review_started() {
    let h = harness();
    let submitter = UserId::new();
    let reviewer = UserId::new();

    let mut input = submit_input("a@x.se");
    input.submitted_by = Some(submitter);
    let request = h.engine.submit(input).await.unwrap();

    h.engine
        .transition_status(request.id, RequestStatus::UnderReview, reviewer, None)
        .await
        .unwrap();

    let err = h.engine.withdraw(request.id, submitter).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::NotPending)
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Account remediation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn account_creation_requires_approved_request() {
    let h = harness();

    let request = h.engine.submit(submit_input("a@x.se")).await.unwrap();
    let err = h
        .engine
        .create_account_for_approved_member(request.id, UserId::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::NotApproved)
    ));
}

#[tokio::test]
async fn account_creation_refused_when_account_exists() {
    let h = harness();
    let admin = UserId::new();

    let request = h.engine.submit(submit_input("a@x.se")).await.unwrap();
    h.engine.approve(request.id, admin, None).await.unwrap();

    let err = h
        .engine
        .create_account_for_approved_member(request.id, admin)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Membership(MembershipError::AccountAlreadyExists)
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// User administration
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_provisioning_hashes_credentials_and_mails_them() {
    let h = harness();
    let admin = UserId::new();

    let created = h
        .engine
        .create_user(
            CreateUserInput {
                email: "styrelse@x.se".to_string(),
                display_name: Some("Sokha".to_string()),
                role: Role::Board,
                is_board_member: true,
            },
            admin,
        )
        .await
        .unwrap();

    assert_eq!(created.user.role, Role::Board);
    assert!(verify_password(
        created.temporary_password.expose(),
        &created.user.password_hash
    )
    .unwrap());

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "styrelse@x.se");

    // Same email again collides.
    let err = h
        .engine
        .create_user(
            CreateUserInput {
                email: "styrelse@x.se".to_string(),
                display_name: None,
                role: Role::User,
                is_board_member: false,
            },
            admin,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmailInUse));
}

#[tokio::test]
async fn last_active_admin_is_protected() {
    let h = harness();
    let actor = UserId::new();

    let only_admin = h
        .engine
        .create_user(
            CreateUserInput {
                email: "admin@x.se".to_string(),
                display_name: None,
                role: Role::Admin,
                is_board_member: false,
            },
            actor,
        )
        .await
        .unwrap()
        .user;

    let err = h
        .engine
        .set_user_active(only_admin.id, false, actor)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LastAdmin));

    let err = h
        .engine
        .change_user_role(only_admin.id, Role::Editor, false, actor)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LastAdmin));

    // A second active admin lifts the guard.
    h.engine
        .create_user(
            CreateUserInput {
                email: "admin2@x.se".to_string(),
                display_name: None,
                role: Role::Admin,
                is_board_member: false,
            },
            actor,
        )
        .await
        .unwrap();

    let updated = h
        .engine
        .set_user_active(only_admin.id, false, actor)
        .await
        .unwrap();
    assert!(!updated.is_active);
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity ledger
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mutations_are_recorded_in_the_ledger() {
    let h = harness();
    let admin = UserId::new();

    let request = h.engine.submit(submit_input("a@x.se")).await.unwrap();
    h.engine.approve(request.id, admin, None).await.unwrap();

    let entries = h
        .ledger
        .query(
            ActivityFilter {
                action_contains: Some("approve".to_string()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor, admin);
    assert_eq!(entries[0].resource_type, "membership_request");
    assert_eq!(
        entries[0].resource_id.as_deref(),
        Some(request.number.as_str())
    );
    assert!(entries[0].before.is_some());
    assert!(entries[0].after.is_some());
}
