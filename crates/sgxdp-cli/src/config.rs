//! Configuration layering for the plugin binary.
//!
//! Precedence, lowest to highest:
//!
//! 1. Built-in defaults.
//! 2. Optional TOML file (`--config <path>`).
//! 3. Environment variables (see [`apply_env_overrides`]).
//! 4. Command-line flags.
//!
//! The result is frozen into a [`PluginConfig`] before the engine starts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sgxdp_hal::{CategoryLayout, Limits};
use sgxdp_runtime::PluginConfig;
use sgxdp_runtime::config::{
    DEFAULT_DEVFS_ROOT, DEFAULT_NAMESPACE, DEFAULT_PODS_PER_CORE, DEFAULT_SCAN_INTERVAL,
    PublishMode, default_limit,
};
use thiserror::Error;
use tracing::error;

/// Pods-per-core estimate used to size the default limits.
pub const PODS_PER_CORE_ENV: &str = "PODS_PER_CORE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings before they are frozen into a [`PluginConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root below which `sgx/enclave` and `sgx/provision` are looked up.
    #[serde(default = "default_devfs_root")]
    pub devfs_root: PathBuf,

    /// Resource namespace, e.g. `sgx.intel.com`.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub layout: CategoryLayout,

    /// Explicit `enclave` (or unified `sgx`) limit; derived when unset.
    #[serde(default)]
    pub enclave_limit: Option<u32>,

    /// Explicit `provision` limit; derived when unset.
    #[serde(default)]
    pub provision_limit: Option<u32>,

    #[serde(default = "default_pods_per_core")]
    pub pods_per_core: u32,

    /// Rescan interval in seconds; `0` publishes once and holds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub debug: bool,
}

fn default_devfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_DEVFS_ROOT)
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_pods_per_core() -> u32 {
    DEFAULT_PODS_PER_CORE
}
fn default_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            devfs_root: default_devfs_root(),
            namespace: default_namespace(),
            layout: CategoryLayout::default(),
            enclave_limit: None,
            provision_limit: None,
            pods_per_core: default_pods_per_core(),
            interval_secs: default_interval_secs(),
            debug: false,
        }
    }
}

impl Config {
    /// Freeze into the engine configuration.  Unset limits become
    /// `pods_per_core × cores`.
    pub fn plugin_config(&self, cores: u32) -> PluginConfig {
        let derived = default_limit(self.pods_per_core, cores);
        PluginConfig {
            devfs_root: self.devfs_root.clone(),
            layout: self.layout,
            limits: Limits {
                enclave: self.enclave_limit.unwrap_or(derived),
                provision: self.provision_limit.unwrap_or(derived),
            },
            publish_mode: PublishMode::from_secs(self.interval_secs),
        }
    }
}

/// Load the config file at `path`, or defaults when no path is given.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(p) => load_from(p),
        None => Ok(Config::default()),
    }
}

pub(crate) fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply environment overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PODS_PER_CORE` | `pods_per_core` |
/// | `SGXDP_DEVFS_ROOT` | `devfs_root` |
/// | `SGXDP_NAMESPACE` | `namespace` |
/// | `SGXDP_INTERVAL_SECS` | `interval_secs` |
///
/// Unparsable numbers are logged and ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable lookup, so tests do
/// not have to mutate the process environment.
pub(crate) fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup(PODS_PER_CORE_ENV) {
        match v.trim().parse::<u32>() {
            Ok(n) => cfg.pods_per_core = n,
            Err(e) => error!(
                variable = PODS_PER_CORE_ENV,
                value = %v,
                error = %e,
                "failed to parse value as an unsigned integer; using {}",
                cfg.pods_per_core
            ),
        }
    }
    if let Some(v) = lookup("SGXDP_DEVFS_ROOT") {
        cfg.devfs_root = PathBuf::from(v);
    }
    if let Some(v) = lookup("SGXDP_NAMESPACE") {
        cfg.namespace = v;
    }
    if let Some(v) = lookup("SGXDP_INTERVAL_SECS") {
        match v.trim().parse::<u64>() {
            Ok(n) => cfg.interval_secs = n,
            Err(e) => error!(
                variable = "SGXDP_INTERVAL_SECS",
                value = %v,
                error = %e,
                "failed to parse value as an unsigned integer; ignoring"
            ),
        }
    }
}
