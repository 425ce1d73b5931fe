//! Form builder endpoints (owner-only except listing and creation)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use scholar_common::models::{Form, FormBasics, FormContent, FormResponse, Requester};
use uuid::Uuid;

use crate::forms::{self, EditorForm};
use crate::public::{self, PublicForm};
use crate::{ApiResult, AppState};

/// GET /api/forms
pub async fn list_forms(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> ApiResult<Json<Vec<Form>>> {
    Ok(Json(forms::list_forms(&state.db, requester.user_id).await?))
}

/// POST /api/forms
///
/// **Request:** `{"name": "...", "kind": "general" | "parents_survey", "slug"?, "description"?, "settings"?}`
pub async fn create_form(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Json(basics): Json<FormBasics>,
) -> ApiResult<(StatusCode, Json<EditorForm>)> {
    let created = forms::create_form(&state.db, requester.user_id, basics).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/forms/:id
pub async fn get_form(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<Json<EditorForm>> {
    Ok(Json(forms::load_for_editor(&state.db, form_id, requester.user_id).await?))
}

/// PUT /api/forms/:id
pub async fn update_form(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(form_id): Path<Uuid>,
    Json(basics): Json<FormBasics>,
) -> ApiResult<Json<Form>> {
    Ok(Json(forms::update_basics(&state.db, form_id, requester.user_id, basics).await?))
}

/// DELETE /api/forms/:id
pub async fn delete_form(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    forms::delete_form(&state.db, form_id, requester.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/forms/:id/content
///
/// **Request:** `{"sections": [...], "questions": [...]}`
pub async fn save_content(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(form_id): Path<Uuid>,
    Json(content): Json<FormContent>,
) -> ApiResult<Json<Form>> {
    Ok(Json(
        forms::update_working_content(&state.db, form_id, requester.user_id, content).await?,
    ))
}

/// POST /api/forms/:id/preview
pub async fn prepare_preview(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<Json<Form>> {
    Ok(Json(forms::prepare_preview(&state.db, form_id, requester.user_id).await?))
}

/// POST /api/forms/:id/publish
///
/// The body is optional; when present it is applied as basics before publishing.
pub async fn publish(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(form_id): Path<Uuid>,
    basics: Option<Json<FormBasics>>,
) -> ApiResult<Json<Form>> {
    let basics = basics.map(|Json(b)| b);
    Ok(Json(forms::publish(&state.db, form_id, requester.user_id, basics).await?))
}

/// GET /api/forms/:id/responses
pub async fn list_responses(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(form_id): Path<Uuid>,
) -> ApiResult<Json<Vec<FormResponse>>> {
    Ok(Json(forms::list_responses(&state.db, form_id, requester.user_id).await?))
}

/// GET /api/forms/preview/:slug
pub async fn preview_by_slug(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PublicForm>> {
    Ok(Json(public::get_preview_form(&state.db, &slug, requester.user_id).await?))
}

pub fn form_routes() -> Router<AppState> {
    Router::new()
        .route("/api/forms", get(list_forms).post(create_form))
        .route(
            "/api/forms/:id",
            get(get_form).put(update_form).delete(delete_form),
        )
        .route("/api/forms/:id/content", put(save_content))
        .route("/api/forms/:id/preview", post(prepare_preview))
        .route("/api/forms/:id/publish", post(publish))
        .route("/api/forms/:id/responses", get(list_responses))
        .route("/api/forms/preview/:slug", get(preview_by_slug))
}
