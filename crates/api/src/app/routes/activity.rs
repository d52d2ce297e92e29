use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use medlem_audit::ActivityFilter;
use medlem_auth::Capability;
use medlem_core::{Pagination, UserId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().route("/", get(query_activity))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub actor: Option<String>,
    /// Substring match on the `resource.verb` action string.
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /admin/activity - audit trail, newest first.
pub async fn query_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<ActivityQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ViewActivity) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let filter_actor = match query.actor.as_deref() {
        Some(raw) => match raw.parse::<UserId>() {
            Ok(id) => Some(id),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid actor id",
                )
            }
        },
        None => None,
    };

    let filter = ActivityFilter {
        actor: filter_actor,
        action_contains: query.action,
        resource_type: query.resource_type,
        resource_id: query.resource_id,
        occurred_after: query.after,
        occurred_before: query.before,
    };

    let page = Pagination::new(query.limit, query.offset);
    match services.engine.query_activity(filter, page).await {
        Ok(entries) => {
            let items: Vec<_> = entries.iter().map(dto::activity_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ledger_error",
            e.to_string(),
        ),
    }
}
