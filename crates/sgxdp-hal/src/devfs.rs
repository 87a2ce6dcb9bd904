//! Device enumerator – turns device-node presence into resource instances.
//!
//! Each [`CategorySpec`] names one or more device nodes (relative to the
//! devfs root) that must **all** exist for the category to be advertised.
//! When they do, `limit` identical instances are synthesised, each binding
//! every required node read-write at the same path inside the container.
//! When any of them is missing or cannot be inspected, the category yields
//! nothing for this scan.
//!
//! Neither outcome is an error: an absent device is a legitimate state that
//! is re-evaluated on the next scan.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sgxdp_types::{DeviceDescriptor, ResourceCategory, ResourceInstance};
use tracing::{error, trace, warn};

/// Result of inspecting one device node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
    /// The node could not be inspected for a reason other than "not found"
    /// (e.g. permission denied).  Handled like [`Presence::Absent`] but
    /// reported separately so misconfiguration does not go unnoticed.
    Inaccessible(String),
}

/// Answers "does this device node exist?".
///
/// Implemented by [`HostDevfs`] for the real filesystem and by
/// [`SimDevfs`][crate::sim::SimDevfs] for tests and dry runs.
pub trait DevicePresence: Send + Sync {
    fn check(&self, path: &Path) -> Presence;
}

/// Checks presence against the host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostDevfs;

impl DevicePresence for HostDevfs {
    fn check(&self, path: &Path) -> Presence {
        match std::fs::metadata(path) {
            Ok(_) => Presence::Present,
            Err(e) if e.kind() == ErrorKind::NotFound => Presence::Absent,
            Err(e) => Presence::Inaccessible(e.to_string()),
        }
    }
}

/// What to advertise for one [`ResourceCategory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySpec {
    pub category: ResourceCategory,
    /// Device nodes relative to the devfs root, e.g. `sgx/enclave`.
    pub required: Vec<PathBuf>,
    /// Number of instances to synthesise when every node is present.
    pub limit: u32,
}

impl CategorySpec {
    pub fn new(category: ResourceCategory, required: Vec<PathBuf>, limit: u32) -> Self {
        Self {
            category,
            required,
            limit,
        }
    }
}

/// Produce the instances of `spec` given the devfs `root`.
///
/// Returns exactly `spec.limit` healthy instances with IDs
/// `"<category>-0" .. "<category>-(limit-1)"` when every required node is
/// present, and an empty list otherwise.
pub fn enumerate(
    root: &Path,
    spec: &CategorySpec,
    presence: &dyn DevicePresence,
) -> Vec<ResourceInstance> {
    let mut nodes = Vec::with_capacity(spec.required.len());
    for relative in &spec.required {
        let path = root.join(relative);
        match presence.check(&path) {
            Presence::Present => nodes.push(path),
            Presence::Absent => {
                error!(
                    category = %spec.category,
                    path = %path.display(),
                    "No SGX device node available; withholding category"
                );
                return Vec::new();
            }
            Presence::Inaccessible(reason) => {
                warn!(
                    category = %spec.category,
                    path = %path.display(),
                    error = %reason,
                    "SGX device node exists but cannot be inspected; withholding category"
                );
                return Vec::new();
            }
        }
    }

    let descriptors: Vec<DeviceDescriptor> = nodes.iter().map(DeviceDescriptor::bind).collect();
    trace!(category = %spec.category, limit = spec.limit, "synthesising instances");

    (0..spec.limit)
        .map(|ordinal| {
            ResourceInstance::healthy(spec.category.instance_id(ordinal), descriptors.clone())
        })
        .collect()
}
