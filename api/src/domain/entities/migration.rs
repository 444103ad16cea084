//! Schema migration domain entities
//!
//! A `Migration` is a versioned SQL script compiled into the binary.
//! An `AppliedMigration` is the ledger row written when a migration ran.
//! `MigrationPlan` compares the two to decide what still has to run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::MigrationError;

/// A versioned schema change embedded in the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub const fn new(version: i64, name: &'static str, sql: &'static str) -> Self {
        Self { version, name, sql }
    }

    pub fn checksum(&self) -> String {
        checksum(self.sql)
    }
}

impl std::fmt::Display for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}_{}", self.version, self.name)
    }
}

/// Lowercase hex SHA-256 of a migration script
pub fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// A row of the migration ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

/// Highest applied version, `None` on an empty schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion(pub Option<i64>);

impl SchemaVersion {
    pub fn of(applied: &[AppliedMigration]) -> Self {
        Self(applied.iter().map(|m| m.version).max())
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "empty"),
        }
    }
}

/// What a migration run will do against the current ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Migrations still to apply, in version order
    pub pending: Vec<Migration>,
    /// Number of embedded migrations already recorded in the ledger
    pub already_applied: usize,
}

impl MigrationPlan {
    /// Check the embedded set on its own: names present, versions strictly increasing
    pub fn validate(embedded: &[Migration]) -> Result<(), MigrationError> {
        let mut previous: Option<i64> = None;
        for migration in embedded {
            if migration.version <= 0 {
                return Err(MigrationError::Invalid(format!(
                    "{} has a non-positive version",
                    migration
                )));
            }
            if migration.name.trim().is_empty() {
                return Err(MigrationError::Invalid(format!(
                    "migration {} has no name",
                    migration.version
                )));
            }
            if let Some(prev) = previous {
                if migration.version <= prev {
                    return Err(MigrationError::Invalid(format!(
                        "{} is not ordered after version {}",
                        migration, prev
                    )));
                }
            }
            previous = Some(migration.version);
        }
        Ok(())
    }

    /// Compare the embedded migrations with the ledger.
    ///
    /// Fails when a recorded migration was edited after it ran, or when the
    /// ledger holds a version this build does not ship.
    pub fn build(
        embedded: &[Migration],
        applied: &[AppliedMigration],
    ) -> Result<Self, MigrationError> {
        Self::validate(embedded)?;

        let by_version: HashMap<i64, &Migration> =
            embedded.iter().map(|m| (m.version, m)).collect();

        for row in applied {
            match by_version.get(&row.version) {
                None => {
                    return Err(MigrationError::UnknownAppliedVersion {
                        version: row.version,
                        name: row.name.clone(),
                    })
                }
                Some(migration) if migration.checksum() != row.checksum => {
                    return Err(MigrationError::ChecksumMismatch {
                        version: row.version,
                        name: migration.name.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();
        let pending: Vec<Migration> = embedded
            .iter()
            .filter(|m| !applied_versions.contains(&m.version))
            .copied()
            .collect();

        Ok(Self {
            already_applied: embedded.len() - pending.len(),
            pending,
        })
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Ledger compared with the embedded set, reporting every difference
/// instead of failing on the first one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStatus {
    /// Embedded versions not yet recorded
    pub pending: Vec<i64>,
    /// Recorded versions this build does not ship
    pub unknown: Vec<i64>,
    /// Recorded versions whose script changed since they ran
    pub modified: Vec<i64>,
}

impl LedgerStatus {
    pub fn compare(embedded: &[Migration], applied: &[AppliedMigration]) -> Self {
        let by_version: HashMap<i64, &AppliedMigration> =
            applied.iter().map(|m| (m.version, m)).collect();
        let mut status = Self::default();

        for migration in embedded {
            match by_version.get(&migration.version) {
                None => status.pending.push(migration.version),
                Some(row) if row.checksum != migration.checksum() => {
                    status.modified.push(migration.version)
                }
                Some(_) => {}
            }
        }
        status.unknown = applied
            .iter()
            .map(|m| m.version)
            .filter(|v| !embedded.iter().any(|m| m.version == *v))
            .collect();

        status
    }
}
