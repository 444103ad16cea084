//! Start order
//!
//! A service starts only after everything it depends on. Services with no
//! ordering constraint between them keep their declaration order.

use std::collections::HashMap;

use crate::error::{Result, StackError};
use crate::model::StackManifest;

pub fn start_order(manifest: &StackManifest) -> Result<Vec<&str>> {
    let index: HashMap<&str, usize> = manifest
        .services
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let count = manifest.services.len();
    let mut remaining_deps = vec![0usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

    for (i, service) in manifest.services.iter().enumerate() {
        for dep in &service.depends_on {
            let &j = index
                .get(dep.service.as_str())
                .ok_or_else(|| StackError::UnknownService(dep.service.clone()))?;
            remaining_deps[i] += 1;
            dependents[j].push(i);
        }
    }

    let mut order = Vec::with_capacity(count);
    let mut started = vec![false; count];

    // Lowest declaration index among ready services goes first
    while let Some(next) = (0..count).find(|&i| !started[i] && remaining_deps[i] == 0) {
        started[next] = true;
        order.push(manifest.services[next].name.as_str());
        for &dependent in &dependents[next] {
            remaining_deps[dependent] -= 1;
        }
    }

    if order.len() < count {
        return Err(StackError::Cycle(find_cycle(manifest, &started, &index)));
    }

    Ok(order)
}

/// Walks unstarted services until one repeats
fn find_cycle(
    manifest: &StackManifest,
    started: &[bool],
    index: &HashMap<&str, usize>,
) -> Vec<String> {
    let Some(mut current) = (0..started.len()).find(|&i| !started[i]) else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    loop {
        if let Some(pos) = path.iter().position(|&i| i == current) {
            let mut cycle: Vec<String> = path[pos..]
                .iter()
                .map(|&i| manifest.services[i].name.clone())
                .collect();
            cycle.push(manifest.services[current].name.clone());
            return cycle;
        }
        path.push(current);

        // An unstarted service always has at least one unstarted dependency
        let next = manifest.services[current]
            .depends_on
            .iter()
            .filter_map(|d| index.get(d.service.as_str()).copied())
            .find(|&j| !started[j]);
        match next {
            Some(j) => current = j,
            None => return path.iter().map(|&i| manifest.services[i].name.clone()).collect(),
        }
    }
}
