//! Strict resolution of existing infrastructure by key attributes.
//!
//! `ResourceLookup` is the seam between the builder and whatever knows about
//! live infrastructure. Lookups are strict: zero matches is `NotFound`, more
//! than one is `Ambiguous`. `Inventory` implements it over a YAML file of
//! known resources.

use super::types::{Protocol, ResourceKind, Tag};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Opaque handle to an existing network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    pub id: String,
}

/// Opaque handle to an existing cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    pub arn: String,
    pub security_groups: Vec<String>,
}

/// Opaque handle to an existing listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupErrorKind {
    NotFound,
    Ambiguous(usize),
}

/// A failed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    pub resource: ResourceKind,
    pub key: String,
    pub kind: LookupErrorKind,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LookupErrorKind::NotFound => write!(f, "{} '{}' not found", self.resource, self.key),
            LookupErrorKind::Ambiguous(n) => write!(
                f,
                "{} '{}' is ambiguous ({} matches)",
                self.resource, self.key, n
            ),
        }
    }
}

/// Resolves existing resources into handles usable by the graph.
pub trait ResourceLookup {
    fn network(&self, name: &str) -> Result<NetworkHandle, LookupError>;

    /// `security_groups` is carried into the handle verbatim; it does not
    /// take part in matching.
    fn cluster(
        &self,
        name: &str,
        network: &NetworkHandle,
        security_groups: &[String],
    ) -> Result<ClusterHandle, LookupError>;

    fn listener(&self, protocol: Protocol, tag: &Tag) -> Result<ListenerHandle, LookupError>;
}

/// Reduce candidate matches to exactly one.
fn exactly_one<'a, T>(
    resource: ResourceKind,
    key: String,
    mut matches: Vec<&'a T>,
) -> Result<&'a T, LookupError> {
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(LookupError {
            resource,
            key,
            kind: LookupErrorKind::NotFound,
        }),
        n => Err(LookupError {
            resource,
            key,
            kind: LookupErrorKind::Ambiguous(n),
        }),
    }
}

// ============================================================================
// Inventory file
// ============================================================================

/// Known existing infrastructure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub networks: Vec<InventoryNetwork>,

    #[serde(default)]
    pub clusters: Vec<InventoryCluster>,

    #[serde(default)]
    pub listeners: Vec<InventoryListener>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryNetwork {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryCluster {
    pub name: String,
    /// Network ID the cluster lives in
    pub network: String,
    pub arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryListener {
    pub arn: String,
    pub protocol: Protocol,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
}

/// Load an inventory from a YAML file.
pub fn load_inventory(path: &Path) -> Result<Inventory, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read inventory {}: {}", path.display(), e))?;
    parse_inventory(&content)
}

/// Parse an inventory from a YAML string.
pub fn parse_inventory(yaml: &str) -> Result<Inventory, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("inventory parse error: {}", e))
}

impl ResourceLookup for Inventory {
    fn network(&self, name: &str) -> Result<NetworkHandle, LookupError> {
        let matches: Vec<_> = self.networks.iter().filter(|n| n.name == name).collect();
        let found = exactly_one(ResourceKind::Network, name.to_string(), matches)?;
        Ok(NetworkHandle {
            id: found.id.clone(),
        })
    }

    fn cluster(
        &self,
        name: &str,
        network: &NetworkHandle,
        security_groups: &[String],
    ) -> Result<ClusterHandle, LookupError> {
        let matches: Vec<_> = self
            .clusters
            .iter()
            .filter(|c| c.name == name && c.network == network.id)
            .collect();
        let key = format!("{} in {}", name, network.id);
        let found = exactly_one(ResourceKind::Cluster, key, matches)?;
        Ok(ClusterHandle {
            arn: found.arn.clone(),
            security_groups: security_groups.to_vec(),
        })
    }

    fn listener(&self, protocol: Protocol, tag: &Tag) -> Result<ListenerHandle, LookupError> {
        let matches: Vec<_> = self
            .listeners
            .iter()
            .filter(|l| l.protocol == protocol && l.tags.get(&tag.key) == Some(&tag.value))
            .collect();
        let key = format!("{} {}", protocol, tag);
        let found = exactly_one(ResourceKind::Listener, key, matches)?;
        Ok(ListenerHandle {
            arn: found.arn.clone(),
        })
    }
}
