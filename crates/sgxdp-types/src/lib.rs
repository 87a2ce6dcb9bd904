use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named class of advertised resource (e.g. `"enclave"`, `"provision"`).
///
/// Categories are fixed at startup and never change while the plugin runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceCategory(String);

impl ResourceCategory {
    /// Access to `/dev/sgx/enclave`.
    pub const ENCLAVE: &'static str = "enclave";
    /// Access to `/dev/sgx/provision`.
    pub const PROVISION: &'static str = "provision";
    /// Single category that binds both enclave and provision nodes together.
    pub const UNIFIED: &'static str = "sgx";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn enclave() -> Self {
        Self::new(Self::ENCLAVE)
    }

    pub fn provision() -> Self {
        Self::new(Self::PROVISION)
    }

    pub fn unified() -> Self {
        Self::new(Self::UNIFIED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic instance ID for the `ordinal`-th unit of this category,
    /// e.g. `"enclave-3"`.
    pub fn instance_id(&self, ordinal: u32) -> String {
        format!("{}-{}", self.0, ordinal)
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permission granted to the consumer on a bound device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AccessMode {
    #[default]
    #[serde(rename = "rw")]
    ReadWrite,
}

/// Health state of one resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Health {
    Healthy,
    Unhealthy,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Healthy => write!(f, "Healthy"),
            Health::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// One filesystem node to bind-mount into a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub host_path: PathBuf,
    pub container_path: PathBuf,
    pub access: AccessMode,
}

impl DeviceDescriptor {
    /// Bind `path` read-write at the same location inside the container.
    pub fn bind(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            host_path: path.clone(),
            container_path: path,
            access: AccessMode::ReadWrite,
        }
    }
}

/// One schedulable unit within a [`ResourceCategory`].
///
/// Instances are synthetic: many of them share the same host device node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: String,
    pub health: Health,
    /// Ordered list of nodes bound together when this instance is allocated.
    pub descriptors: Vec<DeviceDescriptor>,
}

impl ResourceInstance {
    pub fn healthy(id: impl Into<String>, descriptors: Vec<DeviceDescriptor>) -> Self {
        Self {
            id: id.into(),
            health: Health::Healthy,
            descriptors,
        }
    }
}

/// Complete snapshot of every category and its instances.
///
/// Rebuilt from scratch on every scan.  Ordered maps keep two scans of the
/// same filesystem state structurally identical, including their serialized
/// form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTree {
    categories: BTreeMap<ResourceCategory, BTreeMap<String, ResourceInstance>>,
}

impl DeviceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `category` has an entry, even when it ends up with no
    /// instances.
    pub fn ensure_category(&mut self, category: ResourceCategory) {
        self.categories.entry(category).or_default();
    }

    /// Insert `instance` under `category`.  An instance with the same ID
    /// replaces the previous one, so IDs stay unique per category.
    pub fn add_device(&mut self, category: ResourceCategory, instance: ResourceInstance) {
        self.categories
            .entry(category)
            .or_default()
            .insert(instance.id.clone(), instance);
    }

    pub fn category(&self, category: &ResourceCategory) -> Option<&BTreeMap<String, ResourceInstance>> {
        self.categories.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &ResourceCategory> {
        self.categories.keys()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&ResourceCategory, &BTreeMap<String, ResourceInstance>)> {
        self.categories.iter()
    }

    /// Number of instances advertised for `category` (0 when unknown).
    pub fn instance_count(&self, category: &ResourceCategory) -> usize {
        self.categories.get(category).map_or(0, BTreeMap::len)
    }

    pub fn total_instances(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    /// `true` when no category holds any instance.
    pub fn is_empty(&self) -> bool {
        self.total_instances() == 0
    }
}

/// Errors surfaced by the plugin engine and its collaborators.
///
/// Missing or unreadable device nodes are never errors; they show up as an
/// empty category.  Only [`PluginError::Fatal`] terminates a scan.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Fatal scan fault during {stage}: {details}")]
    Fatal { stage: String, details: String },

    #[error("Configuration Error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_joins_category_and_ordinal() {
        assert_eq!(ResourceCategory::enclave().instance_id(0), "enclave-0");
        assert_eq!(ResourceCategory::provision().instance_id(17), "provision-17");
    }

    #[test]
    fn bind_maps_host_path_to_same_container_path() {
        let d = DeviceDescriptor::bind("/dev/sgx/enclave");
        assert_eq!(d.host_path, PathBuf::from("/dev/sgx/enclave"));
        assert_eq!(d.host_path, d.container_path);
        assert_eq!(d.access, AccessMode::ReadWrite);
    }

    #[test]
    fn add_device_keeps_ids_unique_per_category() {
        let mut tree = DeviceTree::new();
        let cat = ResourceCategory::enclave();
        tree.add_device(cat.clone(), ResourceInstance::healthy("enclave-0", vec![]));
        tree.add_device(cat.clone(), ResourceInstance::healthy("enclave-0", vec![]));
        tree.add_device(cat.clone(), ResourceInstance::healthy("enclave-1", vec![]));
        assert_eq!(tree.instance_count(&cat), 2);
    }

    #[test]
    fn ensure_category_creates_empty_entry() {
        let mut tree = DeviceTree::new();
        tree.ensure_category(ResourceCategory::provision());
        assert!(tree.category(&ResourceCategory::provision()).is_some());
        assert_eq!(tree.instance_count(&ResourceCategory::provision()), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn unknown_category_counts_zero() {
        let tree = DeviceTree::new();
        assert_eq!(tree.instance_count(&ResourceCategory::unified()), 0);
        assert!(tree.category(&ResourceCategory::unified()).is_none());
    }

    #[test]
    fn tree_serializes_with_device_plugin_vocabulary() {
        let mut tree = DeviceTree::new();
        tree.add_device(
            ResourceCategory::enclave(),
            ResourceInstance::healthy("enclave-0", vec![DeviceDescriptor::bind("/dev/sgx/enclave")]),
        );
        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains("\"enclave\""));
        assert!(json.contains("\"rw\""));
        assert!(json.contains("\"Healthy\""));

        let back: DeviceTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }

    #[test]
    fn plugin_error_display() {
        let err = PluginError::Fatal {
            stage: "enumerate".to_string(),
            details: "devfs root vanished".to_string(),
        };
        assert!(err.to_string().contains("Fatal scan fault during enumerate"));

        let err = PluginError::Config("bad limit".to_string());
        assert!(err.to_string().contains("bad limit"));
    }
}
