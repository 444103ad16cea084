//! Schema migrator
//!
//! Brings the database schema up to the migrations embedded in the binary.
//! Safe to run on every start: recorded migrations are skipped.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::entities::{Migration, MigrationPlan, SchemaVersion};
use crate::domain::ports::SchemaStore;
use crate::error::MigrationError;

/// Outcome of a migration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Versions applied by this run, in order
    pub applied: Vec<i64>,
    /// Migrations that were already recorded before this run
    pub already_applied: usize,
    /// Schema version after the run
    pub schema_version: SchemaVersion,
}

pub struct Migrator<S: SchemaStore + ?Sized> {
    store: Arc<S>,
    migrations: Vec<Migration>,
}

impl<S: SchemaStore + ?Sized> Migrator<S> {
    pub fn new(store: Arc<S>, migrations: Vec<Migration>) -> Result<Self, MigrationError> {
        MigrationPlan::validate(&migrations)?;
        Ok(Self { store, migrations })
    }

    /// Compare the ledger with the embedded set without changing anything.
    /// A missing ledger reads as an empty schema.
    pub async fn plan(&self) -> Result<MigrationPlan, MigrationError> {
        let applied = if self.store.ledger_exists().await? {
            self.store.applied().await?
        } else {
            Vec::new()
        };
        MigrationPlan::build(&self.migrations, &applied)
    }

    /// Apply every pending migration in version order, stopping at the first failure
    pub async fn run(&self) -> Result<MigrationReport, MigrationError> {
        self.store.ensure_ledger().await?;
        let applied = self.store.applied().await?;
        let plan = MigrationPlan::build(&self.migrations, &applied)?;

        if plan.is_up_to_date() {
            tracing::info!(
                already_applied = plan.already_applied,
                "Schema is up to date, no pending migrations"
            );
        } else {
            tracing::info!(
                pending = plan.pending.len(),
                already_applied = plan.already_applied,
                "Applying pending migrations"
            );
        }

        let mut applied = Vec::with_capacity(plan.pending.len());
        for migration in &plan.pending {
            tracing::info!(version = migration.version, name = migration.name, "Applying migration");

            self.store
                .apply(migration)
                .await
                .map_err(|e| MigrationError::Failed {
                    version: migration.version,
                    name: migration.name.to_string(),
                    reason: e.to_string(),
                })?;

            applied.push(migration.version);
        }

        // The ledger now matches the embedded set exactly
        let schema_version = SchemaVersion(self.migrations.last().map(|m| m.version));

        Ok(MigrationReport {
            applied,
            already_applied: plan.already_applied,
            schema_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        applied_row, test_migrations, InMemorySchemaStore, StoreCall, BROKEN, CREATE_AUTHORS,
        CREATE_PAPERS,
    };

    fn migrator(
        store: &Arc<InMemorySchemaStore>,
        migrations: Vec<Migration>,
    ) -> Migrator<InMemorySchemaStore> {
        Migrator::new(store.clone(), migrations).unwrap()
    }

    #[tokio::test]
    async fn fresh_schema_applies_everything_in_order() {
        let store = Arc::new(InMemorySchemaStore::new());
        let report = migrator(&store, test_migrations()).run().await.unwrap();

        assert_eq!(report.applied, vec![1, 2]);
        assert_eq!(report.already_applied, 0);
        assert_eq!(report.schema_version, SchemaVersion(Some(2)));
        assert_eq!(store.executed(), vec![1, 2]);
    }

    #[tokio::test]
    async fn rerun_is_a_noop() {
        let store = Arc::new(InMemorySchemaStore::new());
        let migrator = migrator(&store, test_migrations());

        migrator.run().await.unwrap();
        let report = migrator.run().await.unwrap();

        assert!(report.applied.is_empty());
        assert_eq!(report.already_applied, 2);
        // Each script ran exactly once across both runs
        assert_eq!(store.executed(), vec![1, 2]);
    }

    #[tokio::test]
    async fn ledger_is_created_before_it_is_read() {
        let store = Arc::new(InMemorySchemaStore::new());
        migrator(&store, test_migrations()).run().await.unwrap();

        let calls = store.calls();
        assert_eq!(calls[0], StoreCall::EnsureLedger);
        assert_eq!(calls[1], StoreCall::Applied);
    }

    #[tokio::test]
    async fn only_new_migrations_are_applied() {
        let store = Arc::new(
            InMemorySchemaStore::new().with_applied(vec![applied_row(&CREATE_PAPERS)]),
        );
        let report = migrator(&store, test_migrations()).run().await.unwrap();

        assert_eq!(report.applied, vec![CREATE_AUTHORS.version]);
        assert_eq!(report.already_applied, 1);
        assert_eq!(store.executed(), vec![CREATE_AUTHORS.version]);
    }

    #[tokio::test]
    async fn failure_stops_the_run() {
        let store = Arc::new(InMemorySchemaStore::new().with_failing_version(BROKEN.version));
        let extra = Migration::new(4, "after_broken", "SELECT 1;");
        let err = migrator(&store, vec![CREATE_PAPERS, CREATE_AUTHORS, BROKEN, extra])
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Failed { version: 3, ref name, .. } if name == "broken"
        ));
        // Migrations before the broken one were applied; nothing after it ran
        assert_eq!(store.executed(), vec![1, 2]);
        assert!(!store.calls().contains(&StoreCall::Apply(4)));
    }

    #[tokio::test]
    async fn edited_migration_applies_nothing() {
        let mut row = applied_row(&CREATE_PAPERS);
        row.checksum = "0".repeat(64);
        let store = Arc::new(InMemorySchemaStore::new().with_applied(vec![row]));

        let err = migrator(&store, test_migrations()).run().await.unwrap_err();

        assert!(matches!(err, MigrationError::ChecksumMismatch { version: 1, .. }));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn plan_does_not_touch_a_fresh_schema() {
        let store = Arc::new(InMemorySchemaStore::new());
        let plan = migrator(&store, test_migrations()).plan().await.unwrap();

        assert_eq!(plan.pending.len(), 2);
        assert!(store.executed().is_empty());
        assert_eq!(store.calls(), vec![StoreCall::LedgerExists]);
        assert!(!store.has_ledger());
    }

    #[tokio::test]
    async fn plan_reads_an_existing_ledger() {
        let store = Arc::new(
            InMemorySchemaStore::new().with_applied(vec![applied_row(&CREATE_PAPERS)]),
        );
        let plan = migrator(&store, test_migrations()).plan().await.unwrap();

        assert_eq!(plan.pending, vec![CREATE_AUTHORS]);
        assert_eq!(store.calls(), vec![StoreCall::LedgerExists, StoreCall::Applied]);
    }

    #[tokio::test]
    async fn unreachable_store_surfaces_as_store_error() {
        let store = Arc::new(InMemorySchemaStore::new().unreachable());
        let err = migrator(&store, test_migrations()).run().await.unwrap_err();
        assert!(matches!(err, MigrationError::Store(_)));
    }

    #[test]
    fn invalid_set_is_rejected_up_front() {
        let store = Arc::new(InMemorySchemaStore::new());
        let result = Migrator::new(store, vec![CREATE_AUTHORS, CREATE_PAPERS]);
        assert!(matches!(result, Err(MigrationError::Invalid(_))));
    }
}
