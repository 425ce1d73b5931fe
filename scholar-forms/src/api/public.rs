//! Unauthenticated respondent endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use scholar_common::models::FormResponse;
use uuid::Uuid;

use crate::public::{self, LookupRequest, LookupResult, PublicForm, SubmitRequest};
use crate::{ApiResult, AppState};

/// GET /api/public/forms/:slug
///
/// Shares its path segment with the response route, so the router names the
/// segment `:id` for both.
pub async fn get_public_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PublicForm>> {
    Ok(Json(public::get_public_form(&state.db, &slug).await?))
}

/// POST /api/public/forms/:id/responses
pub async fn submit_response(
    State(state): State<AppState>,
    Path(form_id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<FormResponse>)> {
    let response = public::submit_response(&state.db, form_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/public/lookup
pub async fn lookup_students(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> ApiResult<Json<LookupResult>> {
    Ok(Json(public::lookup_students(&state.db, &request).await?))
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/public/forms/:id", get(get_public_form))
        .route("/api/public/forms/:id/responses", post(submit_response))
        .route("/api/public/lookup", post(lookup_students))
}
