//! `sgx-device-plugin` – process entry point.
//!
//! 1. Parses flags, loads the optional config file and initialises tracing.
//! 2. Applies environment and flag overrides and freezes a
//!    [`PluginConfig`][sgxdp_runtime::PluginConfig].
//! 3. Installs a Ctrl-C / SIGTERM handler that triggers shutdown.
//! 4. Runs the [`Manager`] on a Tokio runtime until shutdown or a fatal scan
//!    error, which exits non-zero so the orchestrator can restart the pod.

mod cli;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sgxdp_runtime::config::host_cores;
use sgxdp_runtime::{DevicePlugin, Manager, init_tracing, shutdown_channel};
use tracing::{error, info, warn};

use crate::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("sgx-device-plugin: {e}");
            return ExitCode::from(2);
        }
    };

    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG wins; otherwise `info`, or `debug` with --debug / `debug = true`.
    let _guard = init_tracing("sgx-device-plugin", cli.debug || cfg.debug);

    config::apply_env_overrides(&mut cfg);
    cli.apply(&mut cfg);

    let plugin_config = cfg.plugin_config(host_cores());
    if let Err(e) = plugin_config.validate() {
        error!(error = %e, "invalid configuration");
        return ExitCode::from(2);
    }
    let plugin = DevicePlugin::new(plugin_config);

    if cli.print_tree {
        return match serde_json::to_string_pretty(&plugin.snapshot()) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "failed to serialise device tree");
                ExitCode::FAILURE
            }
        };
    }

    // ── Shutdown wiring ───────────────────────────────────────────────────
    // The handle stays alive in `main`: dropping it would count as a
    // shutdown request if the handler cannot be installed.
    let (handle, shutdown) = shutdown_channel();
    let handle = Arc::new(handle);
    let signal_handle = Arc::clone(&handle);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("termination signal received; shutting down");
        signal_handle.trigger();
    }) {
        warn!(error = %e, "Failed to install signal handler; graceful shutdown will not be available");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let manager = Manager::new(cfg.namespace.clone(), plugin);
    let result = runtime.block_on(manager.run(shutdown));
    drop(handle);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "scan loop terminated");
            ExitCode::FAILURE
        }
    }
}
