//! Compose rendering
//!
//! Produces a compose document (JSON, which compose accepts as YAML) from a
//! validated manifest.

use serde_json::{json, Map, Value};

use crate::model::{ServiceDescriptor, StackManifest, VolumeKind};

pub fn render_compose(manifest: &StackManifest) -> Value {
    let mut services = Map::new();
    for service in &manifest.services {
        services.insert(service.name.clone(), render_service(service));
    }

    let mut networks = Map::new();
    for network in &manifest.networks {
        let mut spec = Map::new();
        if network.internal {
            spec.insert("internal".into(), Value::Bool(true));
        }
        networks.insert(network.name.clone(), Value::Object(spec));
    }

    let mut volumes = Map::new();
    for volume in manifest
        .services
        .iter()
        .flat_map(|s| &s.volumes)
        .filter(|v| v.kind == VolumeKind::Named)
    {
        volumes.insert(volume.source.clone(), json!({}));
    }

    let mut doc = Map::new();
    doc.insert("name".into(), Value::String(manifest.name.clone()));
    doc.insert("services".into(), Value::Object(services));
    doc.insert("networks".into(), Value::Object(networks));
    if !volumes.is_empty() {
        doc.insert("volumes".into(), Value::Object(volumes));
    }
    Value::Object(doc)
}

fn render_service(service: &ServiceDescriptor) -> Value {
    let mut out = Map::new();

    if let Some(build) = &service.build {
        let mut spec = Map::new();
        spec.insert(
            "context".into(),
            Value::String(build.context.display().to_string()),
        );
        if let Some(dockerfile) = &build.dockerfile {
            spec.insert(
                "dockerfile".into(),
                Value::String(dockerfile.display().to_string()),
            );
        }
        out.insert("build".into(), Value::Object(spec));
    }
    if let Some(image) = &service.image {
        out.insert("image".into(), Value::String(image.clone()));
    }
    if let Some(command) = &service.command {
        out.insert("command".into(), json!(command));
    }

    out.insert("networks".into(), json!(service.networks));

    if !service.ports.is_empty() {
        let ports: Vec<String> = service.ports.iter().map(|p| p.to_string()).collect();
        out.insert("ports".into(), json!(ports));
    }
    if !service.expose.is_empty() {
        let expose: Vec<String> = service.expose.iter().map(|p| p.to_string()).collect();
        out.insert("expose".into(), json!(expose));
    }
    if let Some(env_file) = &service.env_file {
        out.insert(
            "env_file".into(),
            json!([env_file.display().to_string()]),
        );
    }

    out.insert("restart".into(), Value::String(service.restart.to_string()));

    if !service.depends_on.is_empty() {
        let mut deps = Map::new();
        for dep in &service.depends_on {
            deps.insert(
                dep.service.clone(),
                json!({ "condition": dep.condition.compose_name() }),
            );
        }
        out.insert("depends_on".into(), Value::Object(deps));
    }

    if !service.volumes.is_empty() {
        let volumes: Vec<String> = service.volumes.iter().map(|v| v.to_string()).collect();
        out.insert("volumes".into(), json!(volumes));
    }

    if let Some(check) = &service.healthcheck {
        out.insert(
            "healthcheck".into(),
            json!({
                "test": check.test,
                "interval": format!("{}s", check.interval_secs),
                "timeout": format!("{}s", check.timeout_secs),
                "retries": check.retries,
            }),
        );
    }

    Value::Object(out)
}
