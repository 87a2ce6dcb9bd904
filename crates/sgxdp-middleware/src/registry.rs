//! [`AdvertisementRegistry`] – the authority-side view of advertised resources.
//!
//! The scan engine publishes complete snapshots and never diffs them.  This
//! registry plays the role of the registration authority: it remembers what
//! was last advertised under each fully-qualified resource name
//! (`<namespace>/<category>`, e.g. `sgx.intel.com/enclave`) and turns each
//! new snapshot into a list of [`AdvertisementChange`]s.
//!
//! Only healthy instances count as advertised capacity.

use std::collections::BTreeMap;
use std::fmt;

use sgxdp_types::{DeviceTree, Health, ResourceInstance};

/// A change in what the node advertises to the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertisementChange {
    /// The resource went from zero (or unknown) to `count` units.
    Registered { resource: String, count: usize },
    /// The resource still has units, but a different number.
    Resized {
        resource: String,
        from: usize,
        to: usize,
    },
    /// Same number of units, different instance set or device bindings.
    Updated { resource: String, count: usize },
    /// The resource dropped to zero units or disappeared from the tree.
    Withdrawn { resource: String, from: usize },
}

impl fmt::Display for AdvertisementChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvertisementChange::Registered { resource, count } => {
                write!(f, "registered {resource} ({count} units)")
            }
            AdvertisementChange::Resized { resource, from, to } => {
                write!(f, "resized {resource} ({from} -> {to} units)")
            }
            AdvertisementChange::Updated { resource, count } => {
                write!(f, "updated {resource} ({count} units)")
            }
            AdvertisementChange::Withdrawn { resource, from } => {
                write!(f, "withdrew {resource} (was {from} units)")
            }
        }
    }
}

/// Per-resource state remembered between snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Advertised {
    healthy: Vec<ResourceInstance>,
}

/// Diffs consecutive [`DeviceTree`] snapshots for one namespace.
#[derive(Debug)]
pub struct AdvertisementRegistry {
    namespace: String,
    advertised: BTreeMap<String, Advertised>,
}

impl AdvertisementRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            advertised: BTreeMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully-qualified resource name for `category`.
    pub fn resource_name(&self, category: &str) -> String {
        format!("{}/{}", self.namespace, category)
    }

    /// Number of healthy units currently advertised for `resource`.
    pub fn advertised(&self, resource: &str) -> usize {
        self.advertised.get(resource).map_or(0, |a| a.healthy.len())
    }

    /// Apply a new snapshot and return what changed, ordered by resource
    /// name.  Applying the same snapshot twice yields no changes.
    pub fn apply(&mut self, tree: &DeviceTree) -> Vec<AdvertisementChange> {
        let mut next: BTreeMap<String, Advertised> = BTreeMap::new();
        for (category, instances) in tree.iter() {
            let healthy = instances
                .values()
                .filter(|inst| inst.health == Health::Healthy)
                .cloned()
                .collect();
            next.insert(self.resource_name(category.as_str()), Advertised { healthy });
        }

        let mut changes = Vec::new();
        for (resource, now) in &next {
            let before = self.advertised.get(resource).cloned().unwrap_or_default();
            let (from, to) = (before.healthy.len(), now.healthy.len());
            let change = match (from, to) {
                (0, 0) => None,
                (0, count) => Some(AdvertisementChange::Registered {
                    resource: resource.clone(),
                    count,
                }),
                (from, 0) => Some(AdvertisementChange::Withdrawn {
                    resource: resource.clone(),
                    from,
                }),
                (from, to) if from != to => Some(AdvertisementChange::Resized {
                    resource: resource.clone(),
                    from,
                    to,
                }),
                (_, count) if before != *now => Some(AdvertisementChange::Updated {
                    resource: resource.clone(),
                    count,
                }),
                _ => None,
            };
            changes.extend(change);
        }
        for (resource, before) in &self.advertised {
            if !next.contains_key(resource) && !before.healthy.is_empty() {
                changes.push(AdvertisementChange::Withdrawn {
                    resource: resource.clone(),
                    from: before.healthy.len(),
                });
            }
        }
        changes.sort_by(|a, b| resource_of(a).cmp(resource_of(b)));

        self.advertised = next;
        changes
    }
}

fn resource_of(change: &AdvertisementChange) -> &str {
    match change {
        AdvertisementChange::Registered { resource, .. }
        | AdvertisementChange::Resized { resource, .. }
        | AdvertisementChange::Updated { resource, .. }
        | AdvertisementChange::Withdrawn { resource, .. } => resource,
    }
}
