//! Schema handlers
//!
//! Read-only view of the migration ledger.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{LedgerStatus, SchemaVersion};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AppliedMigrationResponse {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub schema_version: SchemaVersion,
    pub migrations: Vec<AppliedMigrationResponse>,
    /// Versions shipped in this build but not recorded (should be empty while serving)
    pub pending: Vec<i64>,
    /// Recorded versions this build does not ship, e.g. from a newer replica
    pub unknown: Vec<i64>,
    /// Recorded versions whose script differs from this build
    pub modified: Vec<i64>,
}

/// GET /schema
pub async fn get_schema(State(state): State<AppState>) -> Result<Json<SchemaResponse>, AppError> {
    let applied = if state.schema_store.ledger_exists().await? {
        state.schema_store.applied().await?
    } else {
        Vec::new()
    };
    let status = LedgerStatus::compare(&state.migrations, &applied);
    if !status.unknown.is_empty() || !status.modified.is_empty() {
        tracing::warn!(
            unknown = ?status.unknown,
            modified = ?status.modified,
            "Migration ledger differs from this build"
        );
    }

    Ok(Json(SchemaResponse {
        schema_version: SchemaVersion::of(&applied),
        pending: status.pending,
        unknown: status.unknown,
        modified: status.modified,
        migrations: applied
            .into_iter()
            .map(|m| AppliedMigrationResponse {
                version: m.version,
                name: m.name,
                applied_at: m.applied_at,
            })
            .collect(),
    }))
}
