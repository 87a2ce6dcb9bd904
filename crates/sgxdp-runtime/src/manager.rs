//! [`Manager`] – hosts a [`DevicePlugin`] under one resource namespace.
//!
//! Wires the plugin's scan loop to a [`BroadcastNotifier`] and runs an
//! advertiser task that feeds every snapshot into an
//! [`AdvertisementRegistry`], logging each registration change.  Restart
//! policy stays with the process owner: a fatal scan error is returned, not
//! retried.

use sgxdp_middleware::{AdvertisementRegistry, BroadcastNotifier, TreeSubscriber};
use sgxdp_types::PluginError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::plugin::DevicePlugin;
use crate::shutdown::Shutdown;

pub struct Manager {
    namespace: String,
    plugin: DevicePlugin,
    notifier: BroadcastNotifier,
}

impl Manager {
    pub fn new(namespace: impl Into<String>, plugin: DevicePlugin) -> Self {
        Self {
            namespace: namespace.into(),
            plugin,
            notifier: BroadcastNotifier::default(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Additional observer of every published snapshot.  Subscribe before
    /// calling [`run`][Self::run] to see the first one.
    pub fn subscribe(&self) -> TreeSubscriber {
        self.notifier.subscribe()
    }

    /// Run the plugin until `shutdown` fires or a fatal scan error occurs.
    ///
    /// # Errors
    ///
    /// Returns the [`PluginError`] that terminated the scan loop.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), PluginError> {
        let Manager {
            namespace,
            plugin,
            notifier,
        } = self;

        info!(
            namespace = %namespace,
            devfs_root = %plugin.config().devfs_root.display(),
            enclave_limit = plugin.config().limits.enclave,
            provision_limit = plugin.config().limits.provision,
            "SGX device plugin started"
        );

        let advertiser = spawn_advertiser(AdvertisementRegistry::new(namespace), notifier.subscribe());
        let result = plugin.scan(&notifier, shutdown).await;

        // Closing the channel lets the advertiser drain and exit.
        drop(notifier);
        if let Err(e) = advertiser.await {
            warn!(error = %e, "advertiser task ended abnormally");
        }

        match &result {
            Ok(()) => info!("SGX device plugin stopped"),
            Err(e) => warn!(error = %e, "SGX device plugin terminated"),
        }
        result
    }
}

fn spawn_advertiser(
    mut registry: AdvertisementRegistry,
    mut updates: TreeSubscriber,
) -> JoinHandle<AdvertisementRegistry> {
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            let changes = registry.apply(&update.tree);
            if changes.is_empty() {
                debug!(
                    update_id = %update.id,
                    namespace = registry.namespace(),
                    "advertisement unchanged"
                );
            }
            for change in changes {
                info!(update_id = %update.id, "{change}");
            }
        }
        registry
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PluginConfig, PublishMode};
    use crate::shutdown::shutdown_channel;
    use sgxdp_hal::cpu::{CpuidResult, CpuidSource};
    use sgxdp_hal::{CategoryLayout, Limits, SimDevfs};
    use sgxdp_types::ResourceCategory;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoCpuid;

    impl CpuidSource for NoCpuid {
        fn cpuid(&self, _leaf: u32, _subleaf: u32) -> CpuidResult {
            CpuidResult::default()
        }
    }

    fn plugin(fs: SimDevfs, layout: CategoryLayout) -> DevicePlugin {
        DevicePlugin::with_sources(
            PluginConfig {
                devfs_root: PathBuf::from("/dev"),
                layout,
                limits: Limits {
                    enclave: 4,
                    provision: 4,
                },
                publish_mode: PublishMode::Once,
            },
            Arc::new(fs),
            Arc::new(NoCpuid),
        )
    }

    #[tokio::test]
    async fn run_publishes_and_stops_on_shutdown() {
        let fs = SimDevfs::new().with_present("/dev/sgx/enclave");
        let manager = Manager::new("sgx.intel.com", plugin(fs, CategoryLayout::Split));
        assert_eq!(manager.namespace(), "sgx.intel.com");
        let mut sub = manager.subscribe();
        let (handle, shutdown) = shutdown_channel();

        let task = tokio::spawn(manager.run(shutdown));

        let update = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("snapshot in time")
            .expect("channel open");
        assert_eq!(update.tree.instance_count(&ResourceCategory::enclave()), 4);
        assert_eq!(update.tree.instance_count(&ResourceCategory::provision()), 0);

        handle.trigger();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("manager exits")
            .expect("task joins");
        assert!(result.is_ok());
        assert!(sub.recv().await.is_none(), "notifier closed after run");
    }

    #[tokio::test]
    async fn advertiser_returns_registry_with_applied_state() {
        let notifier = BroadcastNotifier::default();
        let advertiser = spawn_advertiser(
            AdvertisementRegistry::new("sgx.intel.com"),
            notifier.subscribe(),
        );

        let fs = SimDevfs::new()
            .with_present("/dev/sgx/enclave")
            .with_present("/dev/sgx/provision");
        notifier.publish(&plugin(fs, CategoryLayout::Unified).snapshot());
        drop(notifier);

        let registry = advertiser.await.expect("advertiser joins");
        assert_eq!(registry.advertised("sgx.intel.com/sgx"), 4);
        assert_eq!(registry.advertised("sgx.intel.com/enclave"), 0);
    }
}
