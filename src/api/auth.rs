//! Registration, login and profile handlers.

use super::{ApiJson, AppState};
use crate::auth::{Authenticated, Credentials, resolve_role};
use crate::db::users::{NewUser, ProfileChanges};
use crate::error::{ApiError, ApiResult};
use crate::types::UserProfile;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub profile_image_url: Option<String>,
    pub admin_invite_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A user record plus a fresh session token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::missing_field(field)),
    }
}

/// Treat blank strings as absent.
fn supplied(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Argon2 is CPU-bound; run it off the async workers.
async fn hash_password(credentials: &Arc<Credentials>, password: String) -> ApiResult<String> {
    let credentials = Arc::clone(credentials);
    tokio::task::spawn_blocking(move || credentials.hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)
}

async fn verify_password(credentials: &Arc<Credentials>, password: String, hash: String) -> ApiResult<bool> {
    let credentials = Arc::clone(credentials);
    tokio::task::spawn_blocking(move || credentials.verify_password(&password, &hash))
        .await
        .map_err(ApiError::internal)
}

fn with_token(state: &AppState, user: UserProfile) -> ApiResult<AuthResponse> {
    let token = state
        .credentials
        .issue_token(&user.id)
        .map_err(ApiError::internal)?;
    Ok(AuthResponse { user, token })
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let name = required(req.name, "name")?;
    let email = required(req.email, "email")?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::missing_field("password"))?;

    let role = resolve_role(
        req.admin_invite_token.as_deref(),
        state.config.auth.admin_invite_token.as_deref(),
    );
    let password_hash = hash_password(&state.credentials, password).await?;

    let user = state.db.create_user(NewUser {
        name,
        email,
        password_hash,
        role,
        profile_image_url: supplied(req.profile_image_url),
    })?;
    info!("Registered {} account {}", user.role, user.id);

    Ok((StatusCode::CREATED, Json(with_token(&state, user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = required(req.email, "email")?;
    let password = req
        .password
        .ok_or_else(|| ApiError::missing_field("password"))?;

    let record = state.db.find_user_by_email(&email)?;
    let verified = match &record {
        Some(record) => {
            verify_password(&state.credentials, password, record.password_hash.clone()).await?
        }
        None => false,
    };
    match record {
        Some(record) if verified => Ok(Json(with_token(&state, record.profile)?)),
        _ => {
            warn!("Failed login for {}", email);
            Err(ApiError::unauthenticated("Invalid credentials"))
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.db.require_user(&caller.id)?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let password_hash = match supplied(req.password) {
        Some(password) => Some(hash_password(&state.credentials, password).await?),
        None => None,
    };

    let user = state.db.update_user_profile(
        &caller.id,
        ProfileChanges {
            name: supplied(req.name).map(|n| n.trim().to_string()),
            email: supplied(req.email).map(|e| e.trim().to_string()),
            password_hash,
        },
    )?;
    info!("Updated profile {}", user.id);

    Ok(Json(with_token(&state, user)?))
}
