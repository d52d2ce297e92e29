use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};

use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().route("/", get(my_permissions))
}

/// GET /admin/permissions - project the caller's own capability set.
///
/// Open to any authenticated user; useful for admin UIs deciding what to
/// show and for answering "why can't I do X" without guesswork.
pub async fn my_permissions(
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "user_id": actor.user_id(),
            "role": actor.role(),
            "is_board_member": actor.is_board_member(),
            "permissions": actor.permissions(),
        })),
    )
        .into_response()
}
