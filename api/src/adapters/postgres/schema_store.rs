//! PostgreSQL adapter for SchemaStore

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    prelude::DateTimeWithTimeZone, ConnectOptions, ConnectionTrait, Database, DatabaseBackend,
    DatabaseConnection, DbErr, FromQueryResult, Statement, TransactionTrait, Value,
};

use crate::domain::entities::{AppliedMigration, Migration};
use crate::domain::ports::SchemaStore;
use crate::error::DomainError;

/// Ledger table name
pub const LEDGER_TABLE: &str = "_schema_migrations";

/// Advisory lock key serializing concurrent migration runs ("sctr" in ASCII)
const MIGRATION_LOCK_KEY: i64 = 0x7363_7472;

/// PostgreSQL implementation of SchemaStore
pub struct PostgresSchemaStore {
    db: DatabaseConnection,
}

impl PostgresSchemaStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open a lazy pool: no connection is attempted until the first query,
    /// so an unreachable database surfaces through `ping` rather than here.
    pub async fn connect(database_url: &str) -> Result<Self, DomainError> {
        let mut options = ConnectOptions::new(database_url.to_owned());
        options
            .max_connections(5)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(true)
            .sqlx_logging(false);

        let db = Database::connect(options)
            .await
            .map_err(|e| DomainError::Connection(e.to_string()))?;

        Ok(Self::new(db))
    }

    #[cfg(test)]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[derive(Debug, FromQueryResult)]
struct LedgerRow {
    version: i64,
    name: String,
    checksum: String,
    applied_at: DateTimeWithTimeZone,
}

/// Convert a ledger row to the domain entity
impl From<LedgerRow> for AppliedMigration {
    fn from(row: LedgerRow) -> Self {
        AppliedMigration {
            version: row.version,
            name: row.name,
            checksum: row.checksum,
            applied_at: row.applied_at.with_timezone(&Utc),
        }
    }
}

fn db_err(e: DbErr) -> DomainError {
    match &e {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => DomainError::Connection(e.to_string()),
        _ => DomainError::Database(e.to_string()),
    }
}

fn select_ledger_sql(filter: &str) -> String {
    format!(
        "SELECT version, name, checksum, applied_at FROM {} {} ORDER BY version",
        LEDGER_TABLE, filter
    )
}

#[async_trait]
impl SchemaStore for PostgresSchemaStore {
    async fn ping(&self) -> Result<(), DomainError> {
        self.db
            .ping()
            .await
            .map_err(|e| DomainError::Connection(e.to_string()))
    }

    async fn ledger_exists(&self) -> Result<bool, DomainError> {
        let row = self
            .db
            .query_one(Statement::from_string(
                DatabaseBackend::Postgres,
                format!(
                    "SELECT to_regclass('{}') IS NOT NULL AS present",
                    LEDGER_TABLE
                ),
            ))
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => row.try_get::<bool>("", "present").map_err(db_err),
            None => Ok(false),
        }
    }

    async fn ensure_ledger(&self) -> Result<(), DomainError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version     BIGINT PRIMARY KEY,
                name        TEXT NOT NULL,
                checksum    TEXT NOT NULL,
                applied_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            LEDGER_TABLE
        );

        self.db.execute_unprepared(&sql).await.map_err(db_err)?;
        Ok(())
    }

    async fn applied(&self) -> Result<Vec<AppliedMigration>, DomainError> {
        let rows = LedgerRow::find_by_statement(Statement::from_string(
            DatabaseBackend::Postgres,
            select_ledger_sql(""),
        ))
        .all(&self.db)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn apply(&self, migration: &Migration) -> Result<AppliedMigration, DomainError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        // Held until commit/rollback; a second backend starting at the same
        // time waits here and then finds the row already present.
        txn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT pg_advisory_xact_lock($1)",
            [Value::from(MIGRATION_LOCK_KEY)],
        ))
        .await
        .map_err(db_err)?;

        let existing = LedgerRow::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            &select_ledger_sql("WHERE version = $1"),
            [Value::from(migration.version)],
        ))
        .one(&txn)
        .await
        .map_err(db_err)?;

        if let Some(row) = existing {
            txn.rollback().await.map_err(db_err)?;
            return Ok(row.into());
        }

        txn.execute_unprepared(migration.sql)
            .await
            .map_err(db_err)?;

        let checksum = migration.checksum();
        let applied_at = Utc::now();
        txn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            &format!(
                "INSERT INTO {} (version, name, checksum, applied_at) VALUES ($1, $2, $3, $4)",
                LEDGER_TABLE
            ),
            [
                Value::from(migration.version),
                Value::from(migration.name),
                Value::from(checksum.clone()),
                Value::from(applied_at.fixed_offset()),
            ],
        ))
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        Ok(AppliedMigration {
            version: migration.version,
            name: migration.name.to_string(),
            checksum,
            applied_at,
        })
    }
}
