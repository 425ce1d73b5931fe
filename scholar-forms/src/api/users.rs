//! Current-user and admin console endpoints
//!
//! Password login is outside this service; a user created through the admin
//! console receives an initial session token in the create response.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use scholar_common::models::{Requester, Role, User};
use scholar_common::{time, Error};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::auth::require_master_admin;
use crate::import::rows::is_email;
use crate::{db, ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub department: Option<String>,
    /// "hod" unless given
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub user: User,
    pub token: String,
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    Role::parse(raw).ok_or_else(|| Error::validation(format!("unknown role '{}'", raw)).into())
}

fn clean_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if !is_email(&email) {
        return Err(Error::validation(format!("'{}' is not a valid email address", raw)).into());
    }
    Ok(email)
}

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{} is required", field)).into());
    }
    Ok(value.to_string())
}

/// GET /api/me
pub async fn me(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> ApiResult<Json<User>> {
    let user = db::users::get_user(&state.db, requester.user_id)
        .await?
        .ok_or_else(|| Error::Unauthenticated("session user no longer exists".to_string()))?;
    Ok(Json(user))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> ApiResult<Json<Vec<User>>> {
    require_master_admin(&requester)?;
    Ok(Json(db::users::list_users(&state.db).await?))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreatedUser>)> {
    require_master_admin(&requester)?;

    let user = User {
        id: Uuid::new_v4(),
        email: clean_email(&request.email)?,
        first_name: required(&request.first_name, "first_name")?,
        last_name: required(&request.last_name, "last_name")?,
        department: request
            .department
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        role: match request.role.as_deref() {
            Some(raw) => parse_role(raw)?,
            None => Role::Hod,
        },
        active: true,
        created_at: time::now(),
    };
    db::users::insert_user(&state.db, &user).await?;
    let token = db::sessions::create_session(&state.db, user.id, state.session_ttl_hours).await?;

    info!(user_id = %user.id, role = user.role.as_str(), "User created");
    Ok((StatusCode::CREATED, Json(CreatedUser { user, token })))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_master_admin(&requester)?;
    let mut user = db::users::get_user(&state.db, user_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", user_id)))?;

    if let Some(email) = request.email.as_deref() {
        user.email = clean_email(email)?;
    }
    if let Some(first_name) = request.first_name.as_deref() {
        user.first_name = required(first_name, "first_name")?;
    }
    if let Some(last_name) = request.last_name.as_deref() {
        user.last_name = required(last_name, "last_name")?;
    }
    if let Some(department) = request.department {
        let department = department.trim().to_string();
        user.department = (!department.is_empty()).then_some(department);
    }
    if let Some(role) = request.role.as_deref() {
        user.role = parse_role(role)?;
    }
    if let Some(active) = request.active {
        if !active && user.id == requester.user_id {
            return Err(Error::Conflict("you cannot deactivate your own account".to_string()).into());
        }
        user.active = active;
    }
    db::users::update_user(&state.db, &user).await?;

    info!(user_id = %user.id, active = user.active, "User updated");
    Ok(Json(user))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", put(update_user))
}
