use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use medlem_infra::EngineError;
use medlem_membership::MembershipError;

/// Map an engine error to a JSON error envelope with a machine-readable
/// reason code.
pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Membership(m) => membership_error_to_response(m),
        EngineError::Domain(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        EngineError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "unauthorized"),
        EngineError::EmailInUse => json_error(
            StatusCode::CONFLICT,
            "email_in_use",
            "email already in use by another account",
        ),
        EngineError::LastAdmin => json_error(
            StatusCode::CONFLICT,
            "last_admin",
            "the last active administrator cannot be demoted or deactivated",
        ),
        EngineError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        EngineError::Credentials(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "credential_error",
            e.to_string(),
        ),
        EngineError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e}"),
        ),
    }
}

fn membership_error_to_response(err: MembershipError) -> axum::response::Response {
    let (status, code) = match &err {
        MembershipError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        MembershipError::InvalidStateTransition { .. } => {
            (StatusCode::CONFLICT, "invalid_state_transition")
        }
        MembershipError::AlreadyTerminal(_) => (StatusCode::CONFLICT, "already_terminal"),
        MembershipError::DuplicateApplication => (StatusCode::CONFLICT, "duplicate_application"),
        MembershipError::EmailAlreadyMember => (StatusCode::CONFLICT, "email_already_member"),
        MembershipError::WrongApprovalTrack => (StatusCode::CONFLICT, "wrong_approval_track"),
        MembershipError::NotApproved => (StatusCode::CONFLICT, "not_approved"),
        MembershipError::AccountAlreadyExists => (StatusCode::CONFLICT, "account_already_exists"),
        MembershipError::NotPending => (StatusCode::CONFLICT, "not_pending"),
        MembershipError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
    };

    json_error(status, code, err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
