//! Reachability between services
//!
//! Two services can open connections to each other iff they share at least
//! one network.

use crate::error::{Result, StackError};
use crate::model::{ServiceDescriptor, StackManifest};

pub struct Topology<'a> {
    manifest: &'a StackManifest,
}

impl<'a> Topology<'a> {
    pub fn new(manifest: &'a StackManifest) -> Self {
        Self { manifest }
    }

    fn service(&self, name: &str) -> Result<&'a ServiceDescriptor> {
        self.manifest
            .service(name)
            .ok_or_else(|| StackError::UnknownService(name.to_string()))
    }

    /// Networks both services are members of
    pub fn shared_networks(&self, a: &str, b: &str) -> Result<Vec<&'a str>> {
        let a = self.service(a)?;
        let b = self.service(b)?;

        Ok(a.networks
            .iter()
            .filter(|n| b.is_member_of(n))
            .map(|n| n.as_str())
            .collect())
    }

    pub fn can_reach(&self, from: &str, to: &str) -> Result<bool> {
        if from == to {
            self.service(from)?;
            return Ok(true);
        }
        Ok(!self.shared_networks(from, to)?.is_empty())
    }

    /// Services `name` can reach, in declaration order
    pub fn reachable_from(&self, name: &str) -> Result<Vec<&'a str>> {
        let origin = self.service(name)?;

        Ok(self
            .manifest
            .services
            .iter()
            .filter(|s| s.name != origin.name)
            .filter(|s| s.networks.iter().any(|n| origin.is_member_of(n)))
            .map(|s| s.name.as_str())
            .collect())
    }
}
