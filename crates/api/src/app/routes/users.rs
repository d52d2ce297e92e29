use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use medlem_auth::{Capability, Role};
use medlem_core::{Pagination, UserId};
use medlem_infra::CreateUserInput;

use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user))
        .route("/:id/role", patch(update_role))
        .route("/:id/activate", post(activate_user))
        .route("/:id/deactivate", post(deactivate_user))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /admin/users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<ListUsersQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ManageUsers) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let page = Pagination::new(query.limit, query.offset);
    match services.engine.list_users(page).await {
        Ok(users) => {
            let items: Vec<_> = users.iter().map(dto::user_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// POST /admin/users - provision an account; credentials go out by email.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateUserBody>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ManageUsers) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let role = match parse_role(&body.role) {
        Ok(role) => role,
        Err(response) => return response,
    };

    let input = CreateUserInput {
        email: body.email,
        display_name: body.display_name,
        role,
        is_board_member: body.is_board_member,
    };

    match services.engine.create_user(input, actor.user_id()).await {
        Ok(created) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "user": dto::user_to_json(&created.user),
                "credentials_issued": true,
            })),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// GET /admin/users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ManageUsers) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: UserId = match parse_id(&id, "invalid user id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services.engine.get_user(id).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// PATCH /admin/users/:id/role
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateRoleBody>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ManageUsers) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: UserId = match parse_id(&id, "invalid user id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    let role = match parse_role(&body.role) {
        Ok(role) => role,
        Err(response) => return response,
    };

    match services
        .engine
        .change_user_role(id, role, body.is_board_member, actor.user_id())
        .await
    {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// POST /admin/users/:id/activate
pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_active(services, actor, id, true).await
}

/// POST /admin/users/:id/deactivate
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_active(services, actor, id, false).await
}

async fn set_active(
    services: Arc<AppServices>,
    actor: ActorContext,
    id: String,
    active: bool,
) -> axum::response::Response {
    if let Err(e) = authz::require(&actor, Capability::ManageUsers) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let id: UserId = match parse_id(&id, "invalid user id") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match services
        .engine
        .set_user_active(id, active, actor.user_id())
        .await
    {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

fn parse_role(raw: &str) -> Result<Role, axum::response::Response> {
    raw.parse::<Role>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_role",
            "role must be one of: USER, AUTHOR, MODERATOR, EDITOR, BOARD, ADMIN",
        )
    })
}
