use axum::http::StatusCode;
use axum::{routing::delete, Router};

pub mod activity;
pub mod members;
pub mod permissions;
pub mod requests;
pub mod system;
pub mod users;

/// Gated routes (layered with the auth middleware in `app::build_router`).
pub fn router() -> Router {
    Router::new()
        .route("/membership/requests/:id", delete(requests::withdraw))
        .nest("/admin/membership/requests", requests::admin_router())
        .nest("/admin/members", members::router())
        .nest("/admin/users", users::router())
        .nest("/admin/activity", activity::router())
        .nest("/admin/permissions", permissions::router())
}

/// Parse a typed id out of a path segment, mapping failure to a 400.
pub(crate) fn parse_id<T: core::str::FromStr>(
    raw: &str,
    message: &'static str,
) -> Result<T, axum::response::Response> {
    raw.parse::<T>().map_err(|_| {
        crate::app::errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", message)
    })
}
