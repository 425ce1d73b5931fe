//! Student roster endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use scholar_common::models::{Student, StudentField, StudentInput, StudentStatus};
use scholar_common::{time, Error};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::import::rows::is_email;
use crate::{db, ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct StudentQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

async fn load_student(state: &AppState, id: Uuid) -> ApiResult<Student> {
    db::students::get_student(&state.db, id)
        .await?
        .ok_or_else(|| Error::not_found(format!("student {}", id)).into())
}

fn check_input(input: &StudentInput) -> ApiResult<()> {
    match input.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(status) if StudentStatus::parse(status).is_none() => {
            return Err(ApiError::BadRequest(format!("unknown student status '{}'", status)));
        }
        _ => {}
    }
    let email = input
        .get(StudentField::GuardianEmail)
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email {
        if !is_email(email) {
            return Err(Error::validation(format!(
                "guardian email '{}' is not a valid email address",
                email
            ))
            .into());
        }
    }
    Ok(())
}

/// GET /api/students?status=active&search=jane
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<StudentQuery>,
) -> ApiResult<Json<Vec<Student>>> {
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            StudentStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown student status '{}'", raw)))?,
        ),
        None => None,
    };
    let students = db::students::list_students(&state.db, status, query.search.as_deref()).await?;
    Ok(Json(students))
}

/// GET /api/students/:id
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Student>> {
    Ok(Json(load_student(&state, id).await?))
}

/// POST /api/students
///
/// A student whose BC No. already exists is a conflict; bulk import is the
/// merge path.
pub async fn create_student(
    State(state): State<AppState>,
    Json(input): Json<StudentInput>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    let student_id = input
        .external_id()
        .ok_or_else(|| Error::validation("student_id is required"))?
        .to_string();
    check_input(&input)?;

    if db::students::find_by_external_id(&state.db, &student_id).await?.is_some() {
        return Err(Error::Conflict(format!("student id {} already exists", student_id)).into());
    }

    let student = Student::from_input(student_id, &input, time::now());
    db::students::save_student(&state.db, &student).await?;
    info!(student_id = %student.student_id, "Student created");
    Ok((StatusCode::CREATED, Json(student)))
}

/// PUT /api/students/:id
///
/// Supplied non-empty fields replace stored ones; a new `student_id` renames
/// the record.
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<StudentInput>,
) -> ApiResult<Json<Student>> {
    check_input(&input)?;
    let mut student = load_student(&state, id).await?;

    if let Some(new_id) = input.external_id() {
        student.student_id = new_id.to_string();
    }
    student.merge(&input, time::now());
    db::students::save_student(&state.db, &student).await?;
    Ok(Json(student))
}

/// DELETE /api/students/:id
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !db::students::delete_student(&state.db, id).await? {
        return Err(Error::not_found(format!("student {}", id)).into());
    }
    info!(id = %id, "Student deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students).post(create_student))
        .route(
            "/api/students/:id",
            get(get_student).put(update_student).delete(delete_student),
        )
}
