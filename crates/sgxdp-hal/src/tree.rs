//! [`TreeBuilder`] – aggregates enumerated instances into a [`DeviceTree`].
//!
//! Every configured category gets an entry in the tree, including
//! categories that produced no instances (device node missing or a limit of
//! zero).  Consumers therefore see the full set of categories on every scan
//! and can tell "zero available" apart from "not configured".

use std::path::Path;

use sgxdp_types::{DeviceTree, ResourceCategory, ResourceInstance};

use crate::devfs::{CategorySpec, DevicePresence, enumerate};

/// Write-once accumulator for a single scan.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: DeviceTree,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `category` with `instances` (possibly none).
    pub fn add_category(
        &mut self,
        category: ResourceCategory,
        instances: Vec<ResourceInstance>,
    ) -> &mut Self {
        self.tree.ensure_category(category.clone());
        for instance in instances {
            self.tree.add_device(category.clone(), instance);
        }
        self
    }

    pub fn build(self) -> DeviceTree {
        self.tree
    }
}

/// Enumerate every spec under `root` and assemble the resulting tree.
pub fn build_tree(root: &Path, specs: &[CategorySpec], presence: &dyn DevicePresence) -> DeviceTree {
    let mut builder = TreeBuilder::new();
    for spec in specs {
        builder.add_category(spec.category.clone(), enumerate(root, spec, presence));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{CategoryLayout, Limits};
    use crate::sim::SimDevfs;
    use sgxdp_types::Health;
    use std::path::PathBuf;

    const FOUR_EACH: Limits = Limits {
        enclave: 4,
        provision: 4,
    };

    fn root() -> &'static Path {
        Path::new("/dev")
    }

    #[test]
    fn both_nodes_present_gives_two_full_categories() {
        let fs = SimDevfs::new()
            .with_present("/dev/sgx/enclave")
            .with_present("/dev/sgx/provision");
        let tree = build_tree(root(), &CategoryLayout::Split.specs(FOUR_EACH), &fs);

        assert_eq!(tree.categories().count(), 2);
        assert_eq!(tree.instance_count(&ResourceCategory::enclave()), 4);
        assert_eq!(tree.instance_count(&ResourceCategory::provision()), 4);
        for (category, instances) in tree.iter() {
            let expected = PathBuf::from("/dev/sgx").join(category.as_str());
            for inst in instances.values() {
                assert_eq!(inst.health, Health::Healthy);
                assert_eq!(inst.descriptors[0].host_path, expected);
            }
        }
    }

    #[test]
    fn missing_provision_only_empties_provision() {
        let fs = SimDevfs::new().with_present("/dev/sgx/enclave");
        let tree = build_tree(root(), &CategoryLayout::Split.specs(FOUR_EACH), &fs);

        assert_eq!(tree.instance_count(&ResourceCategory::enclave()), 4);
        assert_eq!(tree.instance_count(&ResourceCategory::provision()), 0);
        assert!(tree.category(&ResourceCategory::provision()).is_some());
    }

    #[test]
    fn no_nodes_gives_empty_tree_with_all_categories() {
        let tree = build_tree(root(), &CategoryLayout::Split.specs(FOUR_EACH), &SimDevfs::new());
        assert!(tree.is_empty());
        assert_eq!(tree.categories().count(), 2);
    }

    #[test]
    fn zero_limit_keeps_category_present_and_empty() {
        let fs = SimDevfs::new()
            .with_present("/dev/sgx/enclave")
            .with_present("/dev/sgx/provision");
        let limits = Limits {
            enclave: 0,
            provision: 4,
        };
        let tree = build_tree(root(), &CategoryLayout::Split.specs(limits), &fs);
        assert!(tree.category(&ResourceCategory::enclave()).is_some());
        assert_eq!(tree.instance_count(&ResourceCategory::enclave()), 0);
        assert_eq!(tree.instance_count(&ResourceCategory::provision()), 4);
    }

    #[test]
    fn identical_state_builds_identical_trees() {
        let fs = SimDevfs::new().with_present("/dev/sgx/enclave");
        let specs = CategoryLayout::Split.specs(FOUR_EACH);
        assert_eq!(build_tree(root(), &specs, &fs), build_tree(root(), &specs, &fs));
    }

    #[test]
    fn unified_layout_binds_both_nodes_per_instance() {
        let fs = SimDevfs::new()
            .with_present("/dev/sgx/enclave")
            .with_present("/dev/sgx/provision");
        let tree = build_tree(root(), &CategoryLayout::Unified.specs(FOUR_EACH), &fs);
        let sgx = tree.category(&ResourceCategory::unified()).expect("sgx category");
        assert_eq!(sgx.len(), 4);
        assert!(sgx.values().all(|inst| inst.descriptors.len() == 2));
    }
}
