//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: infrastructure wiring (store/ledger/mailer selection)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};

use crate::middleware::{self, AuthState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(jwt_secret: String) -> Router {
    let services = Arc::new(services::build_services().await);
    build_router(AuthState::new(jwt_secret.as_bytes()), services)
}

/// Router assembly, split out so tests can wire in-memory services directly.
pub fn build_router(auth_state: AuthState, services: Arc<services::AppServices>) -> Router {
    // Public surface: liveness + anonymous application submission. The
    // submission handler picks up an actor context itself when a valid
    // bearer token happens to be present.
    let public = Router::new()
        .route("/health", get(routes::system::health))
        .route("/membership/requests", post(routes::requests::submit))
        .layer(Extension(services.clone()))
        .layer(Extension(auth_state.clone()));

    // Everything else requires an authenticated actor.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    public.merge(protected)
}
