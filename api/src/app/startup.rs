//! Startup sequencer
//!
//! Takes the backend from "process started" to "serving requests":
//! 1. wait until the database accepts connections (bounded retries)
//! 2. apply pending migrations
//! 3. serve
//!
//! Each step runs only after the previous one succeeded. A failure in steps
//! 1 or 2 returns before the serve step is ever invoked, so the process exits
//! non-zero without binding its port.

use std::future::Future;
use std::sync::Arc;

use crate::app::{wait_until_ready, MigrationReport, Migrator, RetryPolicy};
use crate::domain::entities::{Migration, MigrationPlan};
use crate::domain::ports::SchemaStore;
use crate::error::StartupError;

/// Phase of the startup sequence, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    WaitingForDatabase,
    Migrating,
    Serving,
}

impl std::fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupPhase::WaitingForDatabase => write!(f, "waiting_for_database"),
            StartupPhase::Migrating => write!(f, "migrating"),
            StartupPhase::Serving => write!(f, "serving"),
        }
    }
}

pub struct StartupSequencer<S: SchemaStore + ?Sized> {
    store: Arc<S>,
    migrator: Migrator<S>,
    retry: RetryPolicy,
}

impl<S: SchemaStore + ?Sized> StartupSequencer<S> {
    pub fn new(
        store: Arc<S>,
        migrations: Vec<Migration>,
        retry: RetryPolicy,
    ) -> Result<Self, StartupError> {
        let migrator = Migrator::new(store.clone(), migrations)?;
        Ok(Self {
            store,
            migrator,
            retry,
        })
    }

    /// Steps 1 and 2: wait for the database, then migrate
    pub async fn prepare(&self) -> Result<MigrationReport, StartupError> {
        tracing::info!(
            phase = %StartupPhase::WaitingForDatabase,
            max_attempts = self.retry.max_attempts,
            budget_ms = self.retry.total_budget().as_millis() as u64,
            "Startup phase"
        );
        wait_until_ready(self.store.as_ref(), &self.retry).await?;

        tracing::info!(phase = %StartupPhase::Migrating, "Startup phase");
        let report = self.migrator.run().await?;
        tracing::info!(
            applied = report.applied.len(),
            schema_version = %report.schema_version,
            "Migrations complete"
        );

        Ok(report)
    }

    /// Wait for the database and report pending migrations without applying them
    pub async fn dry_run(&self) -> Result<MigrationPlan, StartupError> {
        wait_until_ready(self.store.as_ref(), &self.retry).await?;
        Ok(self.migrator.plan().await?)
    }

    /// Full sequence: prepare, then hand over to `serve`, which runs in the
    /// foreground until the server stops.
    pub async fn run<F, Fut>(&self, serve: F) -> Result<(), StartupError>
    where
        F: FnOnce(MigrationReport) -> Fut,
        Fut: Future<Output = Result<(), StartupError>>,
    {
        let report = self.prepare().await?;

        tracing::info!(phase = %StartupPhase::Serving, "Startup phase");
        serve(report).await
    }
}
