//! Test fixtures
//!
//! Small migration sets and retry policies shared by the unit tests.

use std::time::Duration;

use chrono::Utc;

use crate::app::RetryPolicy;
use crate::domain::entities::{AppliedMigration, Migration};

pub const CREATE_PAPERS: Migration = Migration::new(
    1,
    "create_papers",
    "CREATE TABLE IF NOT EXISTS papers (id BIGSERIAL PRIMARY KEY);",
);

pub const CREATE_AUTHORS: Migration = Migration::new(
    2,
    "create_authors",
    "CREATE TABLE IF NOT EXISTS authors (id BIGSERIAL PRIMARY KEY);",
);

pub const BROKEN: Migration = Migration::new(3, "broken", "CREATE TABLE (;");

pub fn test_migrations() -> Vec<Migration> {
    vec![CREATE_PAPERS, CREATE_AUTHORS]
}

pub fn applied_row(migration: &Migration) -> AppliedMigration {
    AppliedMigration {
        version: migration.version,
        name: migration.name.to_string(),
        checksum: migration.checksum(),
        applied_at: Utc::now(),
    }
}

/// Millisecond delays so retry tests finish quickly
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        multiplier: 2.0,
    }
}
