use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use medlem_auth::Capability;
use medlem_core::{MemberId, Pagination};

use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_members))
        .route("/:id", get(get_member))
}

#[derive(Debug, Deserialize)]
pub struct ListMembersQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /admin/members
pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<ListMembersQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ReviewMembership) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let page = Pagination::new(query.limit, query.offset);
    match services.engine.list_members(page).await {
        Ok(members) => {
            let items: Vec<_> = members.iter().map(dto::member_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// GET /admin/members/:id
pub async fn get_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ReviewMembership) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: MemberId = match parse_id(&id, "invalid member id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services.engine.get_member(id).await {
        Ok(member) => (StatusCode::OK, Json(dto::member_to_json(&member))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
