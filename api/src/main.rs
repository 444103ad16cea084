//! scitrend API server
//!
//! Backend entrypoint for the scitrend stack. On start it waits for
//! PostgreSQL to accept connections, applies pending schema migrations and
//! only then binds its listening socket. Any failure before serving exits
//! the process with a non-zero status, which stops the container.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

mod adapters;
mod app;
mod config;
mod domain;
mod error;
mod handlers;
mod migrations;
mod server;
mod telemetry;

#[cfg(test)]
mod test_utils;


use adapters::PostgresSchemaStore;
use app::StartupSequencer;
use config::Config;
use domain::entities::Migration;
use domain::ports::SchemaStore;
use error::StartupError;
use migrations::MIGRATIONS;
use telemetry::LogFormat;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub schema_store: Arc<dyn SchemaStore>,
    pub migrations: Vec<Migration>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Parser)]
#[command(name = "scitrend-api", version, about = "scitrend backend server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Wait for the database, apply migrations, then serve (default)
    Run,
    /// Wait for the database and apply migrations, then exit
    Migrate {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },
    /// Serve without migrating (local development only)
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Loads .env; logging starts with the configured format when it parses
    let config = Config::from_env();
    telemetry::init(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Pretty),
    );

    tracing::info!("Starting scitrend API...");

    let result = match config {
        Ok(config) => run(cli.command.unwrap_or(Command::Run), config).await,
        Err(e) => Err(StartupError::from(e).into()),
    };
    if let Err(e) = &result {
        tracing::error!("Startup failed: {:#}", e);
    }
    result
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    tracing::debug!(
        bind_addr = %config.bind_addr,
        cors_allowed_origin = %config.cors_allowed_origin,
        log_format = ?config.log_format,
        "Configuration loaded"
    );

    let store = Arc::new(
        PostgresSchemaStore::connect(&config.database_url)
            .await
            .context("Failed to configure database pool")?,
    );
    let sequencer =
        StartupSequencer::new(store.clone(), MIGRATIONS.to_vec(), config.retry.clone())?;

    match command {
        Command::Run => {
            let state = app_state(store);
            sequencer
                .run(|_report| serve_app(config.clone(), state))
                .await?;
        }
        Command::Migrate { dry_run: true } => {
            let plan = sequencer.dry_run().await?;
            if plan.is_up_to_date() {
                println!("No pending migrations");
            }
            for migration in &plan.pending {
                println!("pending {}", migration);
            }
        }
        Command::Migrate { dry_run: false } => {
            let report = sequencer.prepare().await?;
            println!(
                "Applied {} migration(s), schema version {}",
                report.applied.len(),
                report.schema_version
            );
        }
        Command::Serve => {
            tracing::warn!("Serving without running migrations");
            serve_app(config, app_state(store)).await?;
        }
    }

    Ok(())
}

fn app_state(store: Arc<PostgresSchemaStore>) -> AppState {
    AppState {
        schema_store: store,
        migrations: MIGRATIONS.to_vec(),
        started_at: Utc::now(),
    }
}

async fn serve_app(config: Config, state: AppState) -> Result<(), StartupError> {
    let app = server::build_router(state, &config.cors_allowed_origin);
    let listener = server::bind(config.bind_addr).await?;
    server::serve(listener, app).await
}
