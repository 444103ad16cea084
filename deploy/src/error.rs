//! Error types for stack manifests

use std::path::PathBuf;

use thiserror::Error;

use crate::validate::Violation;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Manifest has {} violation(s):\n{}", .0.len(), format_violations(.0))]
    Validation(Vec<Violation>),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Dependency cycle between services: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} not healthy after {attempts} attempts: {last_error}")]
    NotHealthy {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, StackError>;
