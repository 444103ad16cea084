//! Domain entities
//!
//! Pure domain models for the schema ledger.

pub mod migration;

pub use migration::{AppliedMigration, LedgerStatus, Migration, MigrationPlan, SchemaVersion};
