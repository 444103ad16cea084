//! Schema store port trait
//!
//! The database as seen by the startup sequence: reachable or not, and a
//! ledger of applied migrations.

use async_trait::async_trait;

use crate::domain::entities::{AppliedMigration, Migration};
use crate::error::DomainError;

/// Database access needed to wait for readiness and migrate
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Round-trip to the database; fails while it is not accepting connections
    async fn ping(&self) -> Result<(), DomainError>;

    /// Whether the migration ledger table exists; never creates it
    async fn ledger_exists(&self) -> Result<bool, DomainError>;

    /// Create the migration ledger if it does not exist yet
    async fn ensure_ledger(&self) -> Result<(), DomainError>;

    /// Ledger rows ordered by version
    async fn applied(&self) -> Result<Vec<AppliedMigration>, DomainError>;

    /// Run one migration and record it, atomically.
    ///
    /// If another process recorded the same version in the meantime the
    /// existing row is returned and the script is not run again.
    async fn apply(&self, migration: &Migration) -> Result<AppliedMigration, DomainError>;
}
