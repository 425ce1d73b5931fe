//! Storage access, one module per entity

pub mod events;
pub mod forms;
pub mod responses;
pub mod sessions;
pub mod students;
pub mod users;
