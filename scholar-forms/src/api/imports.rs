//! Bulk import endpoints
//!
//! Both take a multipart body with a `file` part and, for question and
//! respondent imports, a `form_id` text part.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::post,
    Extension, Json, Router,
};
use scholar_common::models::Requester;
use uuid::Uuid;

use crate::import::{self, ImportKind, ImportPreview, ImportResult};
use crate::{ApiError, ApiResult, AppState};

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Decoded multipart upload
#[derive(Debug, Default)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub form_id: Option<Uuid>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut upload = Upload::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.filename = field.file_name().unwrap_or("upload.csv").to_string();
                upload.bytes = field.bytes().await?.to_vec();
                has_file = true;
            }
            Some("form_id") => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    upload.form_id = Some(Uuid::parse_str(text).map_err(|_| {
                        ApiError::BadRequest(format!("form_id '{}' is not a valid id", text))
                    })?);
                }
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(ApiError::BadRequest("multipart part 'file' is required".to_string()));
    }
    Ok(upload)
}

fn parse_kind(kind: &str) -> ApiResult<ImportKind> {
    ImportKind::parse(kind).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "unknown import kind '{}' (expected questions, respondents or students)",
            kind
        ))
    })
}

/// POST /api/imports/:kind/preview
pub async fn preview_import(
    Path(kind): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<ImportPreview>> {
    let kind = parse_kind(&kind)?;
    let upload = read_upload(multipart).await?;
    Ok(Json(import::preview(kind, &upload.filename, &upload.bytes)?))
}

/// POST /api/imports/:kind
pub async fn commit_import(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<ImportResult>> {
    let kind = parse_kind(&kind)?;
    let upload = read_upload(multipart).await?;
    let result = import::commit(
        &state.db,
        kind,
        &upload.filename,
        &upload.bytes,
        requester.user_id,
        upload.form_id,
    )
    .await?;
    Ok(Json(result))
}

pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/imports/:kind/preview", post(preview_import))
        .route("/api/imports/:kind", post(commit_import))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
