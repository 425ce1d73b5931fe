//! HTTP API handlers

pub mod auth;
pub mod events;
pub mod forms;
pub mod health;
pub mod imports;
pub mod public;
pub mod students;
pub mod users;

pub use auth::auth_middleware;
pub use events::event_routes;
pub use forms::form_routes;
pub use health::health_routes;
pub use imports::import_routes;
pub use public::public_routes;
pub use students::student_routes;
pub use users::user_routes;
