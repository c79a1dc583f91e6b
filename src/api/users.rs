//! User listing handlers.

use super::AppState;
use crate::auth::{AdminOnly, Authenticated};
use crate::error::ApiResult;
use crate::types::{UserProfile, UserWithTaskCounts};
use axum::extract::{Path, State};
use axum::response::Json;

/// Every role=user account with its assignment counts.
pub async fn list_users(
    State(state): State<AppState>,
    AdminOnly(_caller): AdminOnly,
) -> ApiResult<Json<Vec<UserWithTaskCounts>>> {
    Ok(Json(state.db.list_users_with_task_counts()?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.db.require_user(&id)?))
}
