//! Application layer
//!
//! Use cases that coordinate the schema store: readiness wait, migration
//! and the startup sequence that chains them before serving.

pub mod migrator;
pub mod readiness;
pub mod startup;

pub use migrator::{MigrationReport, Migrator};
pub use readiness::{wait_until_ready, RetryPolicy};
pub use startup::StartupSequencer;
