//! stackctl
//!
//! Checks the scitrend deployment manifest and renders it for compose:
//! - `check`: validate networks, ports and dependencies
//! - `order`: print the start order
//! - `render`: emit the compose file
//! - `reach`: ask whether one service can reach another
//! - `wait`: poll a served endpoint until it answers

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scitrend_deploy::{
    load, render_compose, start_order, validate, EndpointProbe, Profile, Topology,
    DEFAULT_MANIFEST,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stackctl", version, about = "scitrend deployment manifest tool")]
struct Cli {
    /// Path to the stack manifest
    #[arg(long, global = true, default_value = DEFAULT_MANIFEST)]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the manifest; exits non-zero on any violation
    Check {
        #[arg(long, value_enum, default_value_t = Profile::Development)]
        profile: Profile,
    },
    /// Print services in start order
    Order,
    /// Write the compose file (JSON) to stdout or a file
    Render {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print whether service A can open connections to service B
    Reach { from: String, to: String },
    /// Poll an endpoint until it answers 2xx
    Wait {
        url: String,
        #[arg(long, default_value_t = 30)]
        attempts: u32,
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check { profile } => {
            let manifest = load(&cli.manifest)?;
            let warnings = validate(&manifest, profile).into_result()?;
            for warning in &warnings {
                tracing::warn!("{}", warning);
            }
            println!(
                "{}: {} service(s), {} network(s), {} warning(s)",
                manifest.name,
                manifest.services.len(),
                manifest.networks.len(),
                warnings.len()
            );
        }
        Command::Order => {
            let manifest = load(&cli.manifest)?;
            for name in start_order(&manifest)? {
                println!("{}", name);
            }
        }
        Command::Render { out } => {
            let manifest = load(&cli.manifest)?;
            validate(&manifest, Profile::Production).into_result()?;

            let rendered = serde_json::to_string_pretty(&render_compose(&manifest))?;
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!(path = %path.display(), "Wrote compose file");
                }
                None => println!("{}", rendered),
            }
        }
        Command::Reach { from, to } => {
            let manifest = load(&cli.manifest)?;
            let topology = Topology::new(&manifest);
            if topology.can_reach(&from, &to)? {
                let via = topology.shared_networks(&from, &to)?;
                println!("{} can reach {} via {}", from, to, via.join(", "));
            } else {
                println!("{} cannot reach {}", from, to);
            }
        }
        Command::Wait {
            url,
            attempts,
            delay_ms,
        } => {
            let probe = EndpointProbe::new(&url)?;
            let status = probe
                .wait_until_healthy("", attempts, Duration::from_millis(delay_ms))
                .await?;
            println!("{} is up: {}", url, status);
        }
    }

    Ok(())
}
