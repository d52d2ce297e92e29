use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use medlem_auth::Capability;
use medlem_core::{Pagination, RequestId};
use medlem_infra::SubmitInput;
use medlem_membership::{ApplicantDetails, ApprovalTrack, MembershipKind, RequestStatus};

use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::ActorContext;
use crate::middleware::{self, AuthState};

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(list_requests))
        .route("/:id", get(get_request))
        .route("/:id/history", get(request_history))
        .route("/:id/status", post(transition_status))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/account", post(create_account))
}

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// POST /membership/requests - public application submission.
///
/// A valid bearer token is optional here; when present, the submitter is
/// recorded so the applicant can later withdraw their own request.
pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth_state): Extension<AuthState>,
    headers: HeaderMap,
    Json(body): Json<dto::SubmitRequestBody>,
) -> axum::response::Response {
    let kind = match parse_kind(body.kind.as_deref()) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let track = match parse_track(body.track.as_deref()) {
        Ok(track) => track,
        Err(response) => return response,
    };

    let submitted_by =
        middleware::maybe_actor(&auth_state, &headers).map(|actor| actor.user_id());

    let input = SubmitInput {
        applicant: ApplicantDetails {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            phone: body.phone,
            street: body.street,
            postal_code: body.postal_code,
            city: body.city,
            motivation: body.motivation,
        },
        kind,
        track,
        submitted_by,
    };

    match services.engine.submit(input).await {
        Ok(request) => (
            StatusCode::CREATED,
            Json(dto::request_to_json(&request)),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// DELETE /membership/requests/:id - applicant withdraws their own pending
/// request.
pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RequestId = match parse_id(&id, "invalid request id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services.engine.withdraw(id, actor.user_id()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// GET /admin/membership/requests - list, optionally filtered by status.
pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<ListRequestsQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ReviewMembership) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let status = match query.status.as_deref() {
        Some(raw) => match raw.parse::<RequestStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_status",
                    "unknown request status",
                )
            }
        },
        None => None,
    };

    let page = Pagination::new(query.limit, query.offset);
    match services.engine.list_requests(status, page).await {
        Ok(requests) => {
            let items: Vec<_> = requests.iter().map(dto::request_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// GET /admin/membership/requests/:id
pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ReviewMembership) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: RequestId = match parse_id(&id, "invalid request id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services.engine.get_request(id).await {
        Ok(request) => (StatusCode::OK, Json(dto::request_to_json(&request))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// GET /admin/membership/requests/:id/history - status change audit trail.
pub async fn request_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ReviewMembership) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: RequestId = match parse_id(&id, "invalid request id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services.engine.request_history(id).await {
        Ok(history) => {
            let items: Vec<_> = history.iter().map(dto::history_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// POST /admin/membership/requests/:id/status - review transition.
pub async fn transition_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransitionBody>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ReviewMembership) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: RequestId = match parse_id(&id, "invalid request id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    let to = match body.status.parse::<RequestStatus>() {
        Ok(status) => status,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_status",
                "unknown request status",
            )
        }
    };

    match services
        .engine
        .transition_status(id, to, actor.user_id(), body.notes)
        .await
    {
        Ok(request) => (StatusCode::OK, Json(dto::request_to_json(&request))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// POST /admin/membership/requests/:id/approve
///
/// The response reports that credentials were issued; the temporary password
/// itself only travels through the notification channel.
pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ApproveBody>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ApproveMembership) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: RequestId = match parse_id(&id, "invalid request id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services.engine.approve(id, actor.user_id(), body.notes).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "request": dto::request_to_json(&outcome.request),
                "member": dto::member_to_json(&outcome.member),
                "user": dto::user_to_json(&outcome.user),
                "credentials_issued": true,
            })),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// POST /admin/membership/requests/:id/reject
pub async fn reject(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectBody>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ApproveMembership) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: RequestId = match parse_id(&id, "invalid request id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services.engine.reject(id, actor.user_id(), body.reason).await {
        Ok(request) => (StatusCode::OK, Json(dto::request_to_json(&request))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// POST /admin/membership/requests/:id/account - remediation path for an
/// approved member without a login account.
pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ManageUsers) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: RequestId = match parse_id(&id, "invalid request id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services
        .engine
        .create_account_for_approved_member(id, actor.user_id())
        .await
    {
        Ok(user) => (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

fn parse_kind(raw: Option<&str>) -> Result<MembershipKind, axum::response::Response> {
    match raw {
        None => Ok(MembershipKind::Individual),
        Some(raw) => raw.parse::<MembershipKind>().map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_kind",
                "kind must be one of: INDIVIDUAL, FAMILY, STUDENT, SUPPORT",
            )
        }),
    }
}

fn parse_track(raw: Option<&str>) -> Result<ApprovalTrack, axum::response::Response> {
    match raw {
        None => Ok(ApprovalTrack::Standard),
        Some(raw) => raw.parse::<ApprovalTrack>().map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_track",
                "track must be one of: STANDARD, BOARD_VOTE",
            )
        }),
    }
}
