//! Event and attendee endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use scholar_common::models::{Attendee, AttendeeStatus, Event, EventInput, Requester};
use serde::Deserialize;
use uuid::Uuid;

use crate::{events, ApiResult, AppState};

/// GET /api/events
pub async fn list_events(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(events::list_events(&state.db, requester.user_id).await?))
}

/// POST /api/events
pub async fn create_event(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Json(input): Json<EventInput>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = events::create_event(&state.db, requester.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/events/:id
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    Ok(Json(events::get_event(&state.db, event_id).await?))
}

/// PUT /api/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(event_id): Path<Uuid>,
    Json(input): Json<EventInput>,
) -> ApiResult<Json<Event>> {
    Ok(Json(
        events::update_event(&state.db, event_id, requester.user_id, input).await?,
    ))
}

/// DELETE /api/events/:id
pub async fn delete_event(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    events::delete_event(&state.db, event_id, requester.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/events/:id/attendees
pub async fn list_attendees(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Attendee>>> {
    Ok(Json(events::list_attendees(&state.db, event_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    /// Defaults to the requester
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// POST /api/events/:id/attendees
pub async fn register_attendee(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(event_id): Path<Uuid>,
    body: Option<Json<RegisterRequest>>,
) -> ApiResult<(StatusCode, Json<Attendee>)> {
    let user_id = body
        .and_then(|Json(req)| req.user_id)
        .unwrap_or(requester.user_id);
    let attendee = events::register_attendee(&state.db, event_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(attendee)))
}

#[derive(Debug, Deserialize)]
pub struct AttendeeStatusRequest {
    pub status: AttendeeStatus,
}

/// PUT /api/events/:id/attendees/:attendee_id
pub async fn set_attendee_status(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path((event_id, attendee_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<AttendeeStatusRequest>,
) -> ApiResult<Json<Attendee>> {
    let attendee = events::set_attendee_status(
        &state.db,
        event_id,
        attendee_id,
        requester.user_id,
        request.status,
    )
    .await?;
    Ok(Json(attendee))
}

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_events).post(create_event))
        .route(
            "/api/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(
            "/api/events/:id/attendees",
            get(list_attendees).post(register_attendee),
        )
        .route("/api/events/:id/attendees/:attendee_id", put(set_attendee_status))
}
