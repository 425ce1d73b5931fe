//! # Scholar Common Library
//!
//! Shared code for the Scholar school-management services:
//! - Error type shared by storage and service layers
//! - Configuration resolution (CLI → environment → TOML → defaults)
//! - Database bootstrap and schema creation
//! - Domain model types (forms, students, events, users)
//! - Pure form-content algorithms (renumbering, editor operations)

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
