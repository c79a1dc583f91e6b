//! Spreadsheet export handlers.

use super::AppState;
use crate::auth::AdminOnly;
use crate::error::ApiResult;
use crate::export::{ReportKind, XLSX_CONTENT_TYPE, build_report};
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use tracing::info;

fn export(state: &AppState, kind: ReportKind) -> ApiResult<Response> {
    let bytes = build_report(&state.db, kind)?;
    info!("Exported {} ({} bytes)", kind.file_name(), bytes.len());

    Ok((
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename={}", kind.file_name()),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub async fn export_tasks(
    State(state): State<AppState>,
    AdminOnly(_caller): AdminOnly,
) -> ApiResult<Response> {
    export(&state, ReportKind::Tasks)
}

pub async fn export_users(
    State(state): State<AppState>,
    AdminOnly(_caller): AdminOnly,
) -> ApiResult<Response> {
    export(&state, ReportKind::Users)
}
