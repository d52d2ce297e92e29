//! Membership request: applicant data, status lifecycle and guards.
//!
//! # Lifecycle
//!
//! ```text
//! PENDING ──> UNDER_REVIEW ──> ADDITIONAL_INFO_REQUESTED
//!    │              │  ▲                │
//!    │              │  └────────────────┤
//!    ▼              ▼                   ▼
//!      APPROVED  /  REJECTED   (absorbing)
//! ```
//!
//! Pending requests may also jump straight to a terminal decision. Terminal
//! states absorb: every attempted change out of APPROVED or REJECTED fails,
//! which also makes an approved request immutable.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medlem_core::{DomainError, MemberId, RequestId, UserId};

use crate::error::MembershipError;

/// Minimum length of the motivation text.
const MIN_MOTIVATION_LEN: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a membership request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    UnderReview,
    AdditionalInfoRequested,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }

    /// Whether `self -> to` is a legal lifecycle edge.
    pub fn can_transition_to(&self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, to) {
            (Pending, UnderReview) => true,
            (Pending, Approved) | (Pending, Rejected) => true,
            (UnderReview, AdditionalInfoRequested) => true,
            (UnderReview, Approved) | (UnderReview, Rejected) => true,
            (AdditionalInfoRequested, UnderReview) => true,
            (AdditionalInfoRequested, Approved) | (AdditionalInfoRequested, Rejected) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::UnderReview => "UNDER_REVIEW",
            RequestStatus::AdditionalInfoRequested => "ADDITIONAL_INFO_REQUESTED",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RequestStatus::Pending),
            "UNDER_REVIEW" => Ok(RequestStatus::UnderReview),
            "ADDITIONAL_INFO_REQUESTED" => Ok(RequestStatus::AdditionalInfoRequested),
            "APPROVED" => Ok(RequestStatus::Approved),
            "REJECTED" => Ok(RequestStatus::Rejected),
            other => Err(DomainError::invalid_id(format!("unknown request status '{other}'"))),
        }
    }
}

/// How the request gets decided.
///
/// Standard-track requests are decided by a single authorized actor. Requests
/// routed through a multi-board-vote track are stored but cannot be approved
/// by the single-actor path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalTrack {
    Standard,
    BoardVote,
}

impl ApprovalTrack {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalTrack::Standard => "STANDARD",
            ApprovalTrack::BoardVote => "BOARD_VOTE",
        }
    }
}

impl FromStr for ApprovalTrack {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD" => Ok(ApprovalTrack::Standard),
            "BOARD_VOTE" => Ok(ApprovalTrack::BoardVote),
            other => Err(DomainError::invalid_id(format!("unknown approval track '{other}'"))),
        }
    }
}

/// Membership category requested by the applicant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipKind {
    Individual,
    Family,
    Student,
    Support,
}

impl MembershipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipKind::Individual => "INDIVIDUAL",
            MembershipKind::Family => "FAMILY",
            MembershipKind::Student => "STUDENT",
            MembershipKind::Support => "SUPPORT",
        }
    }
}

impl FromStr for MembershipKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INDIVIDUAL" => Ok(MembershipKind::Individual),
            "FAMILY" => Ok(MembershipKind::Family),
            "STUDENT" => Ok(MembershipKind::Student),
            "SUPPORT" => Ok(MembershipKind::Support),
            other => Err(DomainError::invalid_id(format!("unknown membership kind '{other}'"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Applicant
// ─────────────────────────────────────────────────────────────────────────────

/// Personal and contact fields of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub motivation: String,
}

impl ApplicantDetails {
    /// Validate required fields and normalize the email in place.
    pub fn validate(&mut self) -> Result<(), MembershipError> {
        fn required(value: &str, field: &str) -> Result<(), MembershipError> {
            if value.trim().is_empty() {
                Err(MembershipError::validation(format!("{field} is required")))
            } else {
                Ok(())
            }
        }

        required(&self.first_name, "first name")?;
        required(&self.last_name, "last name")?;
        required(&self.street, "street")?;
        required(&self.postal_code, "postal code")?;
        required(&self.city, "city")?;

        self.email = medlem_core::normalize_email(&self.email)
            .map_err(|e| MembershipError::validation(e.to_string()))?;

        if self.motivation.trim().chars().count() < MIN_MOTIVATION_LEN {
            return Err(MembershipError::validation(format!(
                "motivation must be at least {MIN_MOTIVATION_LEN} characters"
            )));
        }

        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// A membership application and its lifecycle state.
///
/// # Invariants
/// - `status` only moves along the edges in [`RequestStatus::can_transition_to`].
/// - Once `status` is terminal the record is immutable.
/// - `member_id` is set exactly once, by approval; at most one member per
///   request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub id: RequestId,
    pub number: crate::numbering::RequestNumber,
    pub applicant: ApplicantDetails,
    pub kind: MembershipKind,
    pub track: ApprovalTrack,
    pub status: RequestStatus,
    pub submitted_at: DateTime<Utc>,
    /// Authenticated submitter, if the application came from a logged-in
    /// user. Anonymous submissions carry `None` and cannot be withdrawn.
    pub submitted_by: Option<UserId>,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_notes: Option<String>,
    pub member_id: Option<MemberId>,
}

impl MembershipRequest {
    /// Guard: the request is still open (not absorbed by a terminal state).
    pub fn ensure_open(&self) -> Result<(), MembershipError> {
        if self.status.is_terminal() {
            Err(MembershipError::AlreadyTerminal(self.status))
        } else {
            Ok(())
        }
    }

    /// Guard for a status change: terminal absorption first, then edge
    /// legality.
    pub fn ensure_transition(&self, to: RequestStatus) -> Result<(), MembershipError> {
        self.ensure_open()?;
        if !self.status.can_transition_to(to) {
            return Err(MembershipError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    /// Guard for the single-actor approval path.
    pub fn ensure_approvable(&self) -> Result<(), MembershipError> {
        self.ensure_open()?;
        if self.track != ApprovalTrack::Standard {
            return Err(MembershipError::WrongApprovalTrack);
        }
        Ok(())
    }

    /// Guard for account remediation: only approved requests qualify.
    pub fn ensure_approved(&self) -> Result<(), MembershipError> {
        if self.status != RequestStatus::Approved {
            return Err(MembershipError::NotApproved);
        }
        Ok(())
    }

    /// Guard for withdrawal: only before any decision work has started.
    /// Ownership of the request is an authorization concern checked at the
    /// engine boundary.
    pub fn ensure_pending(&self) -> Result<(), MembershipError> {
        if self.status != RequestStatus::Pending {
            return Err(MembershipError::NotPending);
        }
        Ok(())
    }

    /// Whether `requester` is the authenticated submitter of this request.
    /// Anonymous submissions are owned by nobody.
    pub fn is_submitted_by(&self, requester: UserId) -> bool {
        self.submitted_by == Some(requester)
    }
}

/// One recorded status change (old -> new, by whom, when, why).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub request_id: RequestId,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub actor: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbering::RequestNumber;

    fn applicant() -> ApplicantDetails {
        ApplicantDetails {
            first_name: "Dara".to_string(),
            last_name: "Svensson".to_string(),
            email: "dara@example.se".to_string(),
            phone: None,
            street: "Storgatan 1".to_string(),
            postal_code: "21145".to_string(),
            city: "Malmö".to_string(),
            motivation: "I want to help the community".to_string(),
        }
    }

    fn request(status: RequestStatus) -> MembershipRequest {
        MembershipRequest {
            id: RequestId::new(),
            number: RequestNumber::new(2025, 1),
            applicant: applicant(),
            kind: MembershipKind::Individual,
            track: ApprovalTrack::Standard,
            status,
            submitted_at: Utc::now(),
            submitted_by: None,
            decided_by: None,
            decided_at: None,
            decision_notes: None,
            member_id: None,
        }
    }

    #[test]
    fn pending_can_go_straight_to_decision() {
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Approved));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Rejected));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::UnderReview));
    }

    #[test]
    fn pending_cannot_skip_into_info_requested() {
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::AdditionalInfoRequested));
    }

    #[test]
    fn info_requested_can_return_to_review() {
        assert!(
            RequestStatus::AdditionalInfoRequested.can_transition_to(RequestStatus::UnderReview)
        );
    }

    #[test]
    fn terminal_states_absorb() {
        for terminal in [RequestStatus::Approved, RequestStatus::Rejected] {
            assert!(terminal.is_terminal());
            for to in [
                RequestStatus::Pending,
                RequestStatus::UnderReview,
                RequestStatus::AdditionalInfoRequested,
                RequestStatus::Approved,
                RequestStatus::Rejected,
            ] {
                assert!(!terminal.can_transition_to(to), "{terminal} -> {to}");
            }
        }
    }

    #[test]
    fn transition_guard_reports_terminal_before_edge() {
        let req = request(RequestStatus::Approved);
        assert_eq!(
            req.ensure_transition(RequestStatus::UnderReview),
            Err(MembershipError::AlreadyTerminal(RequestStatus::Approved))
        );

        let req = request(RequestStatus::Pending);
        assert_eq!(
            req.ensure_transition(RequestStatus::AdditionalInfoRequested),
            Err(MembershipError::InvalidStateTransition {
                from: RequestStatus::Pending,
                to: RequestStatus::AdditionalInfoRequested,
            })
        );
    }

    #[test]
    fn board_vote_track_cannot_be_single_approved() {
        let mut req = request(RequestStatus::Pending);
        req.track = ApprovalTrack::BoardVote;
        assert_eq!(req.ensure_approvable(), Err(MembershipError::WrongApprovalTrack));
    }

    #[test]
    fn withdrawal_requires_pending_status() {
        let submitter = UserId::new();

        let mut req = request(RequestStatus::Pending);
        req.submitted_by = Some(submitter);
        assert!(req.ensure_pending().is_ok());
        assert!(req.is_submitted_by(submitter));
        assert!(!req.is_submitted_by(UserId::new()));

        req.status = RequestStatus::UnderReview;
        assert_eq!(req.ensure_pending(), Err(MembershipError::NotPending));
    }

    #[test]
    fn anonymous_submission_is_owned_by_nobody() {
        let req = request(RequestStatus::Pending);
        assert!(!req.is_submitted_by(UserId::new()));
    }

    #[test]
    fn applicant_validation_normalizes_email() {
        let mut a = applicant();
        a.email = "  Dara@Example.SE ".to_string();
        a.validate().unwrap();
        assert_eq!(a.email, "dara@example.se");
    }

    #[test]
    fn applicant_validation_rejects_short_motivation() {
        let mut a = applicant();
        a.motivation = "too short".to_string();
        assert!(matches!(a.validate(), Err(MembershipError::Validation(_))));
    }

    #[test]
    fn applicant_validation_rejects_missing_fields() {
        for field in ["first_name", "last_name", "street", "postal_code", "city"] {
            let mut a = applicant();
            match field {
                "first_name" => a.first_name = " ".to_string(),
                "last_name" => a.last_name = String::new(),
                "street" => a.street = String::new(),
                "postal_code" => a.postal_code = " ".to_string(),
                _ => a.city = String::new(),
            }
            assert!(a.validate().is_err(), "{field} should be required");
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::UnderReview,
            RequestStatus::AdditionalInfoRequested,
            RequestStatus::Approved,
            RequestStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("OPEN".parse::<RequestStatus>().is_err());
    }
}
