//! Command-line flags.  Flags override the config file and environment.

use std::path::PathBuf;

use clap::Parser;
use sgxdp_hal::CategoryLayout;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "sgx-device-plugin",
    version,
    about = "Advertises SGX enclave and provisioning device nodes as node resources"
)]
pub struct Cli {
    /// Number of "enclave" resources (default: PODS_PER_CORE x cores)
    #[arg(long)]
    pub enclave_limit: Option<u32>,

    /// Number of "provision" resources (default: PODS_PER_CORE x cores)
    #[arg(long)]
    pub provision_limit: Option<u32>,

    /// Root directory holding the sgx/ device nodes
    #[arg(long)]
    pub devfs_root: Option<PathBuf>,

    /// Resource namespace advertised to the node agent
    #[arg(long)]
    pub namespace: Option<String>,

    /// Advertise a single "sgx" resource that binds both device nodes
    #[arg(long)]
    pub unified: bool,

    /// Rescan interval in seconds; 0 publishes once and holds until shutdown
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Scan once, print the device tree as JSON and exit
    #[arg(long)]
    pub print_tree: bool,
}

impl Cli {
    /// Overlay the flags that were given onto `cfg`.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(n) = self.enclave_limit {
            cfg.enclave_limit = Some(n);
        }
        if let Some(n) = self.provision_limit {
            cfg.provision_limit = Some(n);
        }
        if let Some(root) = &self.devfs_root {
            cfg.devfs_root = root.clone();
        }
        if let Some(ns) = &self.namespace {
            cfg.namespace = ns.clone();
        }
        if self.unified {
            cfg.layout = CategoryLayout::Unified;
        }
        if let Some(secs) = self.interval_secs {
            cfg.interval_secs = secs;
        }
        if self.debug {
            cfg.debug = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse_with_original_names() {
        let cli = Cli::try_parse_from([
            "sgx-device-plugin",
            "--enclave-limit",
            "20",
            "--provision-limit",
            "5",
            "--debug",
        ])
        .expect("valid flags");
        assert_eq!(cli.enclave_limit, Some(20));
        assert_eq!(cli.provision_limit, Some(5));
        assert!(cli.debug);
        assert!(!cli.unified);
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "sgx-device-plugin",
            "--devfs-root",
            "/host/dev",
            "--unified",
            "--interval-secs",
            "0",
            "--namespace",
            "example.com",
        ])
        .expect("valid flags");
        let mut cfg = Config {
            enclave_limit: Some(9),
            ..Config::default()
        };
        cli.apply(&mut cfg);
        assert_eq!(cfg.devfs_root, PathBuf::from("/host/dev"));
        assert_eq!(cfg.layout, CategoryLayout::Unified);
        assert_eq!(cfg.interval_secs, 0);
        assert_eq!(cfg.namespace, "example.com");
        assert_eq!(cfg.enclave_limit, Some(9), "unset flags keep lower layers");
    }

    #[test]
    fn negative_limit_is_rejected() {
        assert!(Cli::try_parse_from(["sgx-device-plugin", "--enclave-limit", "-1"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
