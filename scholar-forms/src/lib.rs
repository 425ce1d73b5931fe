//! scholar-forms library - forms, imports, students and events service
//!
//! Exposes the HTTP router and the service layers behind it so integration
//! tests can drive either one against an in-memory database.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod events;
pub mod forms;
pub mod import;
pub mod public;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Lifetime of sessions issued by the admin console
    pub session_ttl_hours: i64,
}

impl AppState {
    pub fn new(db: SqlitePool, session_ttl_hours: i64) -> Self {
        Self {
            db,
            session_ttl_hours,
        }
    }
}

/// Build application router
///
/// Staff routes sit behind the bearer-token middleware; health and the
/// respondent-facing public routes do not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::form_routes())
        .merge(api::import_routes())
        .merge(api::student_routes())
        .merge(api::event_routes())
        .merge(api::user_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .merge(api::health_routes())
        .merge(api::public_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
