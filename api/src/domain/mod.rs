//! Domain layer
//!
//! Contains the schema migration model with no external dependencies.
//! - `entities`: migrations and the ledger rows that record them
//! - `ports`: trait definitions for the database

pub mod entities;
pub mod ports;
