//! Domain model types shared by the storage and service layers

pub mod event;
pub mod form;
pub mod student;
pub mod user;

pub use event::*;
pub use form::*;
pub use student::*;
pub use user::*;
