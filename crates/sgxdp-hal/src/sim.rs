//! [`SimDevfs`] – in-process device filesystem for tests and dry runs.
//!
//! Lets the full scan pipeline run in CI without SGX hardware or a populated
//! `/dev`.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use sgxdp_hal::devfs::{DevicePresence, Presence};
//! use sgxdp_hal::sim::SimDevfs;
//!
//! let fs = SimDevfs::new()
//!     .with_present("/dev/sgx/enclave")
//!     .with_inaccessible("/dev/sgx/provision", "permission denied");
//!
//! assert_eq!(fs.check(Path::new("/dev/sgx/enclave")), Presence::Present);
//! assert!(matches!(fs.check(Path::new("/dev/sgx/provision")), Presence::Inaccessible(_)));
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::devfs::{DevicePresence, Presence};

/// Simulated device filesystem.
///
/// Paths not registered read as [`Presence::Absent`].  Nodes can be added or
/// removed while a scan loop is running to exercise hot-plug behaviour.
#[derive(Debug, Default)]
pub struct SimDevfs {
    present: RwLock<HashSet<PathBuf>>,
    inaccessible: RwLock<HashMap<PathBuf, String>>,
}

impl SimDevfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: mark `path` as present.
    pub fn with_present(self, path: impl Into<PathBuf>) -> Self {
        self.insert(path);
        self
    }

    /// Builder-style: mark `path` as failing inspection with `reason`.
    pub fn with_inaccessible(self, path: impl Into<PathBuf>, reason: &str) -> Self {
        if let Ok(mut map) = self.inaccessible.write() {
            map.insert(path.into(), reason.to_string());
        }
        self
    }

    /// Mark `path` as present.
    pub fn insert(&self, path: impl Into<PathBuf>) {
        if let Ok(mut set) = self.present.write() {
            set.insert(path.into());
        }
    }

    /// Remove `path`; subsequent checks report it absent.
    pub fn remove(&self, path: impl AsRef<Path>) {
        if let Ok(mut set) = self.present.write() {
            set.remove(path.as_ref());
        }
    }
}

impl DevicePresence for SimDevfs {
    fn check(&self, path: &Path) -> Presence {
        if let Some(reason) = self
            .inaccessible
            .read()
            .ok()
            .and_then(|map| map.get(path).cloned())
        {
            return Presence::Inaccessible(reason);
        }
        match self.present.read() {
            Ok(set) if set.contains(path) => Presence::Present,
            _ => Presence::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_path_is_absent() {
        let fs = SimDevfs::new();
        assert_eq!(fs.check(Path::new("/dev/sgx/enclave")), Presence::Absent);
    }

    #[test]
    fn insert_and_remove_toggle_presence() {
        let fs = SimDevfs::new();
        fs.insert("/dev/sgx/enclave");
        assert_eq!(fs.check(Path::new("/dev/sgx/enclave")), Presence::Present);
        fs.remove("/dev/sgx/enclave");
        assert_eq!(fs.check(Path::new("/dev/sgx/enclave")), Presence::Absent);
    }

    #[test]
    fn inaccessible_wins_over_present() {
        let fs = SimDevfs::new()
            .with_present("/dev/sgx/enclave")
            .with_inaccessible("/dev/sgx/enclave", "permission denied");
        assert_eq!(
            fs.check(Path::new("/dev/sgx/enclave")),
            Presence::Inaccessible("permission denied".to_string())
        );
    }
}
