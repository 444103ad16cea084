//! Topology invariants
//!
//! Violations make a manifest unusable; warnings flag setups that work but
//! should not ship to production.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, StackError};
use crate::model::{DependencyCondition, ServiceRole, StackManifest, VolumeKind};
use crate::order::start_order;
use crate::topology::Topology;

/// Deployment profile, only affects warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Profile {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DuplicateService(String),
    DuplicateNetwork(String),
    UndeclaredNetwork { service: String, network: String },
    UnknownDependency { service: String, dependency: String },
    DependencyCycle(Vec<String>),
    /// Needs exactly one of `build` or `image`
    AmbiguousSource(String),
    DatabasePublishesPort { service: String, host_port: u16 },
    HostPortConflict { port: u16, services: Vec<String> },
    /// The frontend joined a network that has a database on it
    FrontendReachesDatabase { frontend: String, database: String, network: String },
    BackendMissingDatabaseDependency { backend: String, database: String },
    NoNetworks(String),
    /// Every stack has a backend, a frontend and a database
    MissingRole(ServiceRole),
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::DuplicateService(name) => write!(f, "service '{}' is declared twice", name),
            Violation::DuplicateNetwork(name) => write!(f, "network '{}' is declared twice", name),
            Violation::UndeclaredNetwork { service, network } => {
                write!(f, "service '{}' joins undeclared network '{}'", service, network)
            }
            Violation::UnknownDependency {
                service,
                dependency,
            } => write!(
                f,
                "service '{}' depends on unknown service '{}'",
                service, dependency
            ),
            Violation::DependencyCycle(path) => {
                write!(f, "dependency cycle: {}", path.join(" -> "))
            }
            Violation::AmbiguousSource(name) => write!(
                f,
                "service '{}' must set exactly one of `build` or `image`",
                name
            ),
            Violation::DatabasePublishesPort { service, host_port } => write!(
                f,
                "database '{}' publishes host port {}; databases may only expose ports internally",
                service, host_port
            ),
            Violation::HostPortConflict { port, services } => write!(
                f,
                "host port {} is published by {}",
                port,
                services.join(", ")
            ),
            Violation::FrontendReachesDatabase {
                frontend,
                database,
                network,
            } => write!(
                f,
                "frontend '{}' can reach database '{}' over network '{}'",
                frontend, database, network
            ),
            Violation::BackendMissingDatabaseDependency { backend, database } => write!(
                f,
                "backend '{}' does not depend on database '{}'",
                backend, database
            ),
            Violation::NoNetworks(name) => write!(f, "service '{}' joins no network", name),
            Violation::MissingRole(role) => write!(f, "no service has role '{}'", role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Host source overlaid on the container; the image is not what runs
    SourceBindMount { service: String, source: String },
    /// Container start is not database readiness
    StartedOnlyDependency { service: String, database: String },
    DatabaseWithoutHealthCheck(String),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::SourceBindMount { service, source } => write!(
                f,
                "service '{}' bind-mounts '{}'; ship an immutable image instead",
                service, source
            ),
            Warning::StartedOnlyDependency { service, database } => write!(
                f,
                "service '{}' waits only for '{}' to start, not to accept connections",
                service, database
            ),
            Warning::DatabaseWithoutHealthCheck(name) => {
                write!(f, "database '{}' has no health check", name)
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> Result<Vec<Warning>> {
        if self.violations.is_empty() {
            Ok(self.warnings)
        } else {
            Err(StackError::Validation(self.violations))
        }
    }
}

pub fn validate(manifest: &StackManifest, profile: Profile) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_roles(manifest, &mut report);
    check_unique_names(manifest, &mut report);
    check_sources_and_networks(manifest, &mut report);
    check_dependencies(manifest, &mut report);
    check_ports(manifest, &mut report);
    check_isolation(manifest, &mut report);
    collect_warnings(manifest, profile, &mut report);

    report
}

fn check_roles(manifest: &StackManifest, report: &mut ValidationReport) {
    for role in ServiceRole::ALL {
        if manifest.services_with_role(role).next().is_none() {
            report.violations.push(Violation::MissingRole(role));
        }
    }
}

fn check_unique_names(manifest: &StackManifest, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for service in &manifest.services {
        if !seen.insert(service.name.as_str()) {
            report
                .violations
                .push(Violation::DuplicateService(service.name.clone()));
        }
    }

    let mut seen = HashSet::new();
    for network in &manifest.networks {
        if !seen.insert(network.name.as_str()) {
            report
                .violations
                .push(Violation::DuplicateNetwork(network.name.clone()));
        }
    }
}

fn check_sources_and_networks(manifest: &StackManifest, report: &mut ValidationReport) {
    for service in &manifest.services {
        if service.build.is_some() == service.image.is_some() {
            report
                .violations
                .push(Violation::AmbiguousSource(service.name.clone()));
        }

        if service.networks.is_empty() {
            report
                .violations
                .push(Violation::NoNetworks(service.name.clone()));
        }

        for network in &service.networks {
            if manifest.network(network).is_none() {
                report.violations.push(Violation::UndeclaredNetwork {
                    service: service.name.clone(),
                    network: network.clone(),
                });
            }
        }
    }
}

fn check_dependencies(manifest: &StackManifest, report: &mut ValidationReport) {
    let mut unknown = false;
    for service in &manifest.services {
        for dep in &service.depends_on {
            if manifest.service(&dep.service).is_none() {
                unknown = true;
                report.violations.push(Violation::UnknownDependency {
                    service: service.name.clone(),
                    dependency: dep.service.clone(),
                });
            }
        }
    }

    // Ordering is only meaningful once every edge points somewhere
    if !unknown {
        if let Err(StackError::Cycle(path)) = start_order(manifest) {
            report.violations.push(Violation::DependencyCycle(path));
        }
    }

    for backend in manifest.services_with_role(ServiceRole::Backend) {
        for database in manifest.services_with_role(ServiceRole::Database) {
            if backend.depends_on_service(&database.name).is_none() {
                report
                    .violations
                    .push(Violation::BackendMissingDatabaseDependency {
                        backend: backend.name.clone(),
                        database: database.name.clone(),
                    });
            }
        }
    }
}

fn check_ports(manifest: &StackManifest, report: &mut ValidationReport) {
    let mut by_host_port: HashMap<u16, Vec<String>> = HashMap::new();

    for service in &manifest.services {
        for mapping in &service.ports {
            if service.role == ServiceRole::Database {
                report.violations.push(Violation::DatabasePublishesPort {
                    service: service.name.clone(),
                    host_port: mapping.host,
                });
            }
            by_host_port
                .entry(mapping.host)
                .or_default()
                .push(service.name.clone());
        }
    }

    let mut conflicts: Vec<_> = by_host_port
        .into_iter()
        .filter(|(_, services)| services.len() > 1)
        .collect();
    conflicts.sort_by_key(|(port, _)| *port);

    for (port, services) in conflicts {
        report
            .violations
            .push(Violation::HostPortConflict { port, services });
    }
}

fn check_isolation(manifest: &StackManifest, report: &mut ValidationReport) {
    let topology = Topology::new(manifest);

    for frontend in manifest.services_with_role(ServiceRole::Frontend) {
        for database in manifest.services_with_role(ServiceRole::Database) {
            let shared = topology
                .shared_networks(&frontend.name, &database.name)
                .unwrap_or_default();
            for network in shared {
                report.violations.push(Violation::FrontendReachesDatabase {
                    frontend: frontend.name.clone(),
                    database: database.name.clone(),
                    network: network.to_string(),
                });
            }
        }
    }
}

fn collect_warnings(manifest: &StackManifest, profile: Profile, report: &mut ValidationReport) {
    for service in &manifest.services {
        if profile == Profile::Production && service.role == ServiceRole::Backend {
            for volume in service.volumes.iter().filter(|v| v.kind == VolumeKind::Bind) {
                report.warnings.push(Warning::SourceBindMount {
                    service: service.name.clone(),
                    source: volume.source.clone(),
                });
            }
        }

        for dep in &service.depends_on {
            let is_database = manifest
                .service(&dep.service)
                .map(|s| s.role == ServiceRole::Database)
                .unwrap_or(false);
            if is_database && dep.condition == DependencyCondition::Started {
                report.warnings.push(Warning::StartedOnlyDependency {
                    service: service.name.clone(),
                    database: dep.service.clone(),
                });
            }
        }

        if service.role == ServiceRole::Database && service.healthcheck.is_none() {
            report
                .warnings
                .push(Warning::DatabaseWithoutHealthCheck(service.name.clone()));
        }
    }
}
