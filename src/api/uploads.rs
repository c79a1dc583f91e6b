//! Profile image uploads.

use super::AppState;
use crate::db::now_ms;
use crate::error::{ApiError, ApiResult};
use anyhow::Result;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::Json;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/jpg"];

/// Writes accepted uploads into the uploads directory.
#[derive(Debug, Clone)]
pub struct FileIntake {
    dir: PathBuf,
}

impl FileIntake {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn check_content_type(content_type: Option<&str>) -> ApiResult<()> {
        match content_type {
            Some(ct) if ALLOWED_IMAGE_TYPES.contains(&ct) => Ok(()),
            _ => Err(ApiError::invalid_input(
                "image",
                "Only .jpeg, .png and .jpg format allowed",
            )),
        }
    }

    /// Store `data` under a unique name and return that name.
    pub async fn store(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let short_id = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}-{}-{}",
            now_ms(),
            &short_id[..8],
            sanitize_file_name(original_name)
        );

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), data).await?;
        Ok(file_name)
    }
}

/// Reduce a client-supplied name to its last path segment, keeping only
/// ASCII alphanumerics, `.`, `-` and `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_url: String,
}

/// Accept one image in multipart field `image`.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart
        .map_err(|e| ApiError::invalid_input("image", "No file uploaded").with_details(e.body_text()))?;
    let intake = FileIntake::new(&state.config.server.uploads_dir);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_input("image", "Invalid upload").with_details(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }

        if let Err(e) = FileIntake::check_content_type(field.content_type()) {
            warn!("Rejected upload with content type {:?}", field.content_type());
            return Err(e);
        }

        let original_name = field.file_name().unwrap_or("image").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::invalid_input("image", "Invalid upload").with_details(e.body_text()))?;

        let stored = intake.store(&original_name, &data).await?;
        info!("Stored upload {} ({} bytes) in {}", stored, data.len(), intake.dir().display());

        return Ok(Json(UploadResponse {
            image_url: format!("{}/uploads/{}", state.config.public_url(), stored),
        }));
    }

    Err(ApiError::invalid_input("image", "No file uploaded"))
}
