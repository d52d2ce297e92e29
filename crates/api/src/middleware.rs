use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use medlem_auth::{validate_claims, JwtClaims};

use crate::context::ActorContext;

#[derive(Clone)]
pub struct AuthState {
    decoding_key: DecodingKey,
}

impl AuthState {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    let actor = authenticate(&state, token).ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Decode + validate a bearer token into an actor context.
///
/// Used by the middleware for gated routes and directly by the public
/// submission handler, where a token is optional.
pub fn authenticate(state: &AuthState, token: &str) -> Option<ActorContext> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let claims = match jsonwebtoken::decode::<JwtClaims>(token, &state.decoding_key, &validation) {
        Ok(data) => data.claims,
        Err(e) => {
            tracing::warn!(error = %e, "rejected bearer token");
            return None;
        }
    };

    if let Err(e) = validate_claims(&claims, Utc::now()) {
        tracing::warn!(error = %e, sub = %claims.sub, "rejected claims window");
        return None;
    }

    Some(ActorContext::new(claims.sub, claims.role, claims.board))
}

/// Best-effort authentication from raw headers; `None` when no usable token
/// is present.
pub fn maybe_actor(state: &AuthState, headers: &HeaderMap) -> Option<ActorContext> {
    let token = extract_bearer(headers).ok()?;
    authenticate(state, token)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
