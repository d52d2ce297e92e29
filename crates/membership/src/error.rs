//! Membership lifecycle error kinds.
//!
//! Every variant is a deterministic business outcome the caller can act on;
//! infrastructure failures are represented elsewhere.

use thiserror::Error;

use crate::request::RequestStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// Malformed or missing applicant input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested status change is not a legal edge in the lifecycle.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStateTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// The request already reached an absorbing state.
    #[error("request is already {0} and can no longer change")]
    AlreadyTerminal(RequestStatus),

    /// The applicant's email already has an open or approved application.
    #[error("email already has a pending or approved application")]
    DuplicateApplication,

    /// The applicant's email already belongs to an existing member.
    #[error("email already belongs to an existing member")]
    EmailAlreadyMember,

    /// The request was submitted under the board-vote approval track.
    #[error("request is routed through the board-vote approval track")]
    WrongApprovalTrack,

    /// Account creation requires an approved request.
    #[error("request has not been approved")]
    NotApproved,

    /// The linked member already has a login account.
    #[error("member already has a login account")]
    AccountAlreadyExists,

    /// Withdrawal is only possible while the request is still pending.
    #[error("request is no longer pending")]
    NotPending,

    /// Referenced request/member does not exist.
    #[error("not found")]
    NotFound,
}

impl MembershipError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
