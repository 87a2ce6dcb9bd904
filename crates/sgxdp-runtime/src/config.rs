//! [`PluginConfig`] – immutable engine configuration.
//!
//! Resolved once at startup (flags, environment, config file) and shared
//! read-only with the engine afterwards.

use std::path::PathBuf;
use std::time::Duration;

use sgxdp_hal::{CategoryLayout, CategorySpec, Limits};
use sgxdp_types::PluginError;

/// Device nodes are looked up below this root unless overridden.
pub const DEFAULT_DEVFS_ROOT: &str = "/dev";
/// Resource namespace advertised to the node agent.
pub const DEFAULT_NAMESPACE: &str = "sgx.intel.com";
/// Pods-per-core estimate used to derive the default instance limit.
pub const DEFAULT_PODS_PER_CORE: u32 = 10;
/// Rescan cadence in continuous mode.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// When the engine republishes the device tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Publish once, then hold until shutdown.  Used when the authority owns
    /// the polling cadence.
    Once,
    /// Rescan and republish every interval until shutdown.
    Every(Duration),
}

impl Default for PublishMode {
    fn default() -> Self {
        PublishMode::Every(DEFAULT_SCAN_INTERVAL)
    }
}

impl PublishMode {
    /// `0` means [`PublishMode::Once`].
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            PublishMode::Once
        } else {
            PublishMode::Every(Duration::from_secs(secs))
        }
    }
}

/// Configuration bundle for [`DevicePlugin`][crate::plugin::DevicePlugin].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub devfs_root: PathBuf,
    pub layout: CategoryLayout,
    pub limits: Limits,
    pub publish_mode: PublishMode,
}

impl Default for PluginConfig {
    fn default() -> Self {
        let limit = default_limit(DEFAULT_PODS_PER_CORE, host_cores());
        Self {
            devfs_root: PathBuf::from(DEFAULT_DEVFS_ROOT),
            layout: CategoryLayout::default(),
            limits: Limits {
                enclave: limit,
                provision: limit,
            },
            publish_mode: PublishMode::default(),
        }
    }
}

impl PluginConfig {
    /// Category specs implied by the layout and limits.
    pub fn specs(&self) -> Vec<CategorySpec> {
        self.layout.specs(self.limits)
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] for an empty devfs root or a zero
    /// continuous-mode interval.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.devfs_root.as_os_str().is_empty() {
            return Err(PluginError::Config("devfs root must not be empty".to_string()));
        }
        if self.publish_mode == PublishMode::Every(Duration::ZERO) {
            return Err(PluginError::Config(
                "scan interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// One instance per pod that could run on the node.
pub fn default_limit(pods_per_core: u32, cores: u32) -> u32 {
    pods_per_core.saturating_mul(cores)
}

/// Number of CPUs available to this process (at least 1).
pub fn host_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}
