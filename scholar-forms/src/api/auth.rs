//! Bearer-token authentication middleware
//!
//! Applied to protected routes only. The token's SHA-256 digest is looked up
//! in `sessions`; an unexpired session of an active user attaches a
//! [`Requester`] extension for the handlers.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use scholar_common::models::Requester;
use scholar_common::Error;
use tracing::warn;

use crate::{db, ApiError, AppState};

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()) else {
        warn!(path = %request.uri().path(), "Rejected request without bearer token");
        return Err(Error::Unauthenticated("missing bearer token".to_string()).into());
    };

    let Some(user) = db::sessions::resolve_token(&state.db, token).await? else {
        warn!(path = %request.uri().path(), "Rejected request with invalid or expired token");
        return Err(Error::Unauthenticated("invalid or expired session".to_string()).into());
    };

    request.extensions_mut().insert(Requester {
        user_id: user.id,
        role: user.role,
    });
    Ok(next.run(request).await)
}

/// Admin-console guard
pub fn require_master_admin(requester: &Requester) -> Result<(), ApiError> {
    if requester.is_master_admin() {
        Ok(())
    } else {
        Err(Error::Forbidden("master admin role required".to_string()).into())
    }
}
