//! Request authorization.
//!
//! Every protected handler takes an [`Authenticated`] or [`AdminOnly`]
//! extractor; ownership checks on individual tasks go through
//! [`ensure_assignee_or_admin`].

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::types::Caller;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve the caller from an authorization header value.
pub fn authenticate(state: &AppState, header: Option<&str>) -> ApiResult<Caller> {
    let token = header
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::unauthenticated("Not authorized, no token"))?;

    let claims = state.credentials.verify_token(token).map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::unauthenticated("Not authorized, token failed")
    })?;

    let user = state
        .db
        .get_user(&claims.user_id)?
        .ok_or_else(|| ApiError::unauthenticated("Not authorized, token failed"))?;

    Ok(Caller::from(user))
}

pub fn ensure_admin(caller: &Caller) -> ApiResult<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Access denied, admin only"))
    }
}

/// Allow admins and anyone listed in `assignees`.
pub fn ensure_assignee_or_admin(caller: &Caller, assignees: &[String]) -> ApiResult<()> {
    if caller.is_admin() || assignees.iter().any(|id| *id == caller.id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Not authorized"))
    }
}

fn authorization_header(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Any caller with a valid token.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(state, authorization_header(parts)).map(Authenticated)
    }
}

/// A caller with a valid token and the admin role.
#[derive(Debug, Clone)]
pub struct AdminOnly(pub Caller);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = authenticate(state, authorization_header(parts))?;
        ensure_admin(&caller)?;
        Ok(AdminOnly(caller))
    }
}
