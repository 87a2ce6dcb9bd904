//! [`DevicePlugin`] – scan engine and publisher loop.
//!
//! Each cycle:
//!
//! 1. **Scan** – probe CPU capabilities (diagnostics only), enumerate every
//!    configured category and assemble a fresh [`DeviceTree`].  Filesystem
//!    probing runs on the blocking pool.
//! 2. **Publish** – hand the tree to the [`Notifier`], even when it is empty
//!    so that stale advertisements are retracted.
//! 3. **Sleep** or **hold** – in [`PublishMode::Every`] wait for the interval
//!    and go back to 1; in [`PublishMode::Once`] hold until shutdown.
//!
//! Shutdown ends the loop at step 3 with `Ok(())`.  The only error that
//! escapes is [`PluginError::Fatal`], raised when a scan cannot complete at
//! all; missing device nodes never produce one.

use std::sync::Arc;

use sgxdp_hal::cpu::{self, CpuidSource, HostCpuid};
use sgxdp_hal::{CategorySpec, DevicePresence, HostDevfs, build_tree};
use sgxdp_middleware::Notifier;
use sgxdp_types::{DeviceTree, PluginError};
use tracing::{debug, info, instrument};

use crate::config::{PluginConfig, PublishMode};
use crate::shutdown::Shutdown;

/// Host-probing state shared with the blocking scan task.
struct Probes {
    config: PluginConfig,
    specs: Vec<CategorySpec>,
    presence: Arc<dyn DevicePresence>,
    cpuid: Arc<dyn CpuidSource>,
}

impl Probes {
    fn snapshot(&self) -> DeviceTree {
        let caps = cpu::probe(self.cpuid.as_ref());
        cpu::log_capabilities(&caps);
        build_tree(&self.config.devfs_root, &self.specs, self.presence.as_ref())
    }
}

/// The SGX device plugin engine.
///
/// Construct with [`DevicePlugin::new`] for the real host, or
/// [`DevicePlugin::with_sources`] to substitute the device filesystem and
/// `CPUID` source.
#[derive(Clone)]
pub struct DevicePlugin {
    probes: Arc<Probes>,
}

impl DevicePlugin {
    /// Engine probing the host filesystem and CPU.
    pub fn new(config: PluginConfig) -> Self {
        Self::with_sources(config, Arc::new(HostDevfs), Arc::new(HostCpuid))
    }

    pub fn with_sources(
        config: PluginConfig,
        presence: Arc<dyn DevicePresence>,
        cpuid: Arc<dyn CpuidSource>,
    ) -> Self {
        let specs = config.specs();
        Self {
            probes: Arc::new(Probes {
                config,
                specs,
                presence,
                cpuid,
            }),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.probes.config
    }

    /// Build a tree synchronously on the current thread.
    pub fn snapshot(&self) -> DeviceTree {
        self.probes.snapshot()
    }

    /// Build a fresh tree on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Fatal`] when the scan task itself dies (panic
    /// or runtime shutdown).
    pub async fn scan_once(&self) -> Result<DeviceTree, PluginError> {
        let probes = Arc::clone(&self.probes);
        tokio::task::spawn_blocking(move || probes.snapshot())
            .await
            .map_err(|e| PluginError::Fatal {
                stage: "scan".to_string(),
                details: e.to_string(),
            })
    }

    /// Scan, publish, and repeat per the configured [`PublishMode`] until
    /// `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Propagates [`PluginError::Fatal`] from [`scan_once`][Self::scan_once];
    /// the caller decides whether to restart.
    #[instrument(skip_all, fields(mode = ?self.probes.config.publish_mode))]
    pub async fn scan(
        &self,
        notifier: &dyn Notifier,
        mut shutdown: Shutdown,
    ) -> Result<(), PluginError> {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            let tree = self.scan_once().await?;
            debug!(
                cycle,
                categories = tree.categories().count(),
                instances = tree.total_instances(),
                "publishing device tree"
            );
            notifier.notify(&tree).await;

            match self.probes.config.publish_mode {
                PublishMode::Once => {
                    shutdown.wait().await;
                    info!("shutdown requested; leaving scan loop");
                    return Ok(());
                }
                PublishMode::Every(interval) => {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = shutdown.wait() => {
                            info!(cycle, "shutdown requested; leaving scan loop");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
