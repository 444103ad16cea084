//! Mock implementations of port traits
//!
//! In-memory schema store that can be configured to fail and records every call.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::domain::entities::{AppliedMigration, Migration};
use crate::domain::ports::SchemaStore;
use crate::error::DomainError;

/// A call made against the in-memory store, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Ping,
    LedgerExists,
    EnsureLedger,
    Applied,
    Apply(i64),
}

// ============================================================================
// In-Memory Schema Store
// ============================================================================

#[derive(Default)]
pub struct InMemorySchemaStore {
    ledger: Arc<RwLock<BTreeMap<i64, AppliedMigration>>>,
    ledger_exists: Arc<RwLock<bool>>,
    calls: Arc<RwLock<Vec<StoreCall>>>,
    /// Scripts actually executed (a skipped re-apply does not count)
    executed: Arc<RwLock<Vec<i64>>>,
    /// Number of upcoming pings that fail
    failing_pings: Arc<RwLock<u32>>,
    unreachable: bool,
    failing_version: Option<i64>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the ledger as if these migrations had run earlier
    pub fn with_applied(self, rows: Vec<AppliedMigration>) -> Self {
        {
            let mut ledger = self.ledger.write().unwrap();
            for row in rows {
                ledger.insert(row.version, row);
            }
            *self.ledger_exists.write().unwrap() = true;
        }
        self
    }

    /// The first `count` pings fail, as while the database is still booting
    pub fn with_failing_pings(self, count: u32) -> Self {
        *self.failing_pings.write().unwrap() = count;
        self
    }

    /// Every call fails with a connection error
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Applying this version fails like a broken script
    pub fn with_failing_version(mut self, version: i64) -> Self {
        self.failing_version = Some(version);
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<i64> {
        self.executed.read().unwrap().clone()
    }

    pub fn has_ledger(&self) -> bool {
        *self.ledger_exists.read().unwrap()
    }

    pub fn ping_count(&self) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| **c == StoreCall::Ping)
            .count()
    }

    fn record(&self, call: StoreCall) {
        self.calls.write().unwrap().push(call);
    }

    fn check_reachable(&self) -> Result<(), DomainError> {
        if self.unreachable {
            return Err(DomainError::Connection("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaStore for InMemorySchemaStore {
    async fn ping(&self) -> Result<(), DomainError> {
        self.record(StoreCall::Ping);
        self.check_reachable()?;

        let mut failing = self.failing_pings.write().unwrap();
        if *failing > 0 {
            *failing -= 1;
            return Err(DomainError::Connection(
                "the database system is starting up".to_string(),
            ));
        }
        Ok(())
    }

    async fn ledger_exists(&self) -> Result<bool, DomainError> {
        self.record(StoreCall::LedgerExists);
        self.check_reachable()?;
        Ok(*self.ledger_exists.read().unwrap())
    }

    async fn ensure_ledger(&self) -> Result<(), DomainError> {
        self.record(StoreCall::EnsureLedger);
        self.check_reachable()?;
        *self.ledger_exists.write().unwrap() = true;
        Ok(())
    }

    async fn applied(&self) -> Result<Vec<AppliedMigration>, DomainError> {
        self.record(StoreCall::Applied);
        self.check_reachable()?;
        if !*self.ledger_exists.read().unwrap() {
            return Err(DomainError::Database(
                "relation \"_schema_migrations\" does not exist".to_string(),
            ));
        }
        Ok(self.ledger.read().unwrap().values().cloned().collect())
    }

    async fn apply(&self, migration: &Migration) -> Result<AppliedMigration, DomainError> {
        self.record(StoreCall::Apply(migration.version));
        self.check_reachable()?;

        if let Some(existing) = self.ledger.read().unwrap().get(&migration.version) {
            return Ok(existing.clone());
        }
        if self.failing_version == Some(migration.version) {
            return Err(DomainError::Database(format!(
                "syntax error in migration {}",
                migration
            )));
        }

        let row = AppliedMigration {
            version: migration.version,
            name: migration.name.to_string(),
            checksum: migration.checksum(),
            applied_at: Utc::now(),
        };
        self.executed.write().unwrap().push(migration.version);
        self.ledger
            .write()
            .unwrap()
            .insert(migration.version, row.clone());
        Ok(row)
    }
}
