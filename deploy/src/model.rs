//! Deployment descriptors
//!
//! A `StackManifest` declares the services of one deployment and the
//! networks that isolate them. Descriptors are immutable once parsed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackManifest {
    pub name: String,
    #[serde(default, rename = "network")]
    pub networks: Vec<Network>,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceDescriptor>,
}

impl StackManifest {
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name == name)
    }

    pub fn services_with_role(&self, role: ServiceRole) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter().filter(move |s| s.role == role)
    }
}

/// Named isolation boundary; only members can reach each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    /// No route outside the stack
    #[serde(default)]
    pub internal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDescriptor {
    pub name: String,
    pub role: ServiceRole,
    #[serde(default)]
    pub build: Option<BuildSource>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    /// Published on the host
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    /// Reachable from other services only
    #[serde(default)]
    pub expose: Vec<u16>,
    #[serde(default)]
    pub env_file: Option<PathBuf>,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default)]
    pub depends_on: Vec<Dependency>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub healthcheck: Option<HealthCheck>,
}

impl ServiceDescriptor {
    pub fn is_member_of(&self, network: &str) -> bool {
        self.networks.iter().any(|n| n == network)
    }

    pub fn depends_on_service(&self, name: &str) -> Option<&Dependency> {
        self.depends_on.iter().find(|d| d.service == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    Backend,
    Frontend,
    Database,
}

impl ServiceRole {
    pub const ALL: [ServiceRole; 3] = [
        ServiceRole::Backend,
        ServiceRole::Frontend,
        ServiceRole::Database,
    ];
}

impl std::fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceRole::Backend => write!(f, "backend"),
            ServiceRole::Frontend => write!(f, "frontend"),
            ServiceRole::Database => write!(f, "database"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSource {
    pub context: PathBuf,
    #[serde(default)]
    pub dockerfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    No,
    Always,
    OnFailure,
    UnlessStopped,
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartPolicy::No => write!(f, "no"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::OnFailure => write!(f, "on-failure"),
            RestartPolicy::UnlessStopped => write!(f, "unless-stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub service: String,
    #[serde(default)]
    pub condition: DependencyCondition,
}

/// What "the dependency is up" means before the dependent starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyCondition {
    /// The container process was launched
    #[default]
    Started,
    /// The container's health check passes
    Healthy,
}

impl DependencyCondition {
    /// Name used in compose files
    pub fn compose_name(&self) -> &'static str {
        match self {
            DependencyCondition::Started => "service_started",
            DependencyCondition::Healthy => "service_healthy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Host path for bind mounts, volume name for named volumes
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: VolumeKind,
    #[serde(default)]
    pub read_only: bool,
}

impl std::fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.target)?;
        if self.read_only {
            write!(f, ":ro")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeKind {
    #[default]
    Bind,
    Named,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub test: Vec<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_retries() -> u32 {
    10
}
