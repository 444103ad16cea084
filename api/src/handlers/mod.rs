//! HTTP handlers
//!
//! Axum request handlers for the API endpoints.

pub mod health;
pub mod schema;

pub use health::{health, version};
pub use schema::get_schema;
