//! Manifest loading

use std::path::Path;

use crate::error::{Result, StackError};
use crate::model::StackManifest;

/// Default manifest location, relative to the repository root
pub const DEFAULT_MANIFEST: &str = "deploy/stack.toml";

pub fn load(path: &Path) -> Result<StackManifest> {
    let content = std::fs::read_to_string(path).map_err(|source| StackError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let manifest = parse(&content)?;
    tracing::debug!(
        path = %path.display(),
        services = manifest.services.len(),
        networks = manifest.networks.len(),
        "Loaded stack manifest"
    );
    Ok(manifest)
}

pub fn parse(content: &str) -> Result<StackManifest> {
    Ok(toml::from_str(content)?)
}
