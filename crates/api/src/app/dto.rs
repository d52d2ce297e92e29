//! Request/response DTOs and JSON mapping helpers.

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use medlem_audit::ActivityEntry;
use medlem_auth::User;
use medlem_membership::{Member, MembershipRequest, StatusHistoryEntry};

// ─────────────────────────────────────────────────────────────────────────────
// Request bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitRequestBody {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub motivation: String,
    /// Membership category; defaults to INDIVIDUAL.
    pub kind: Option<String>,
    /// Approval track; defaults to STANDARD.
    pub track: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    #[serde(default)]
    pub is_board_member: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleBody {
    pub role: String,
    #[serde(default)]
    pub is_board_member: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON mapping
// ─────────────────────────────────────────────────────────────────────────────

pub fn request_to_json(request: &MembershipRequest) -> JsonValue {
    json!({
        "id": request.id,
        "request_number": request.number,
        "applicant": {
            "first_name": request.applicant.first_name,
            "last_name": request.applicant.last_name,
            "email": request.applicant.email,
            "phone": request.applicant.phone,
            "street": request.applicant.street,
            "postal_code": request.applicant.postal_code,
            "city": request.applicant.city,
            "motivation": request.applicant.motivation,
        },
        "kind": request.kind,
        "track": request.track,
        "status": request.status,
        "submitted_at": request.submitted_at,
        "decided_by": request.decided_by,
        "decided_at": request.decided_at,
        "decision_notes": request.decision_notes,
        "member_id": request.member_id,
    })
}

pub fn member_to_json(member: &Member) -> JsonValue {
    json!({
        "id": member.id,
        "member_number": member.number,
        "email": member.email,
        "full_name": member.full_name,
        "user_id": member.user_id,
        "kind": member.kind,
        "is_active": member.is_active,
        "joined_at": member.joined_at,
    })
}

/// User projection for admin views. The password hash never leaves the
/// store layer.
pub fn user_to_json(user: &User) -> JsonValue {
    json!({
        "id": user.id,
        "email": user.email,
        "display_name": user.display_name,
        "role": user.role,
        "is_board_member": user.is_board_member,
        "is_active": user.is_active,
        "created_at": user.created_at,
    })
}

pub fn history_to_json(entry: &StatusHistoryEntry) -> JsonValue {
    json!({
        "from": entry.from,
        "to": entry.to,
        "actor": entry.actor,
        "notes": entry.notes,
        "occurred_at": entry.occurred_at,
    })
}

pub fn activity_to_json(entry: &ActivityEntry) -> JsonValue {
    json!({
        "id": entry.id,
        "actor": entry.actor,
        "action": entry.action,
        "resource_type": entry.resource_type,
        "resource_id": entry.resource_id,
        "description": entry.description,
        "before": entry.before,
        "after": entry.after,
        "occurred_at": entry.occurred_at,
    })
}
