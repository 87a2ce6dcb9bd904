//! `sgxdp-runtime` – The Scan Engine
//!
//! Drives the scan → publish → sleep cycle that keeps the cluster's view of
//! this node's SGX resources current.
//!
//! # Modules
//!
//! - [`config`] – [`PluginConfig`][config::PluginConfig]: devfs root,
//!   category layout, per-category limits and [`PublishMode`][config::PublishMode],
//!   resolved once at startup and never mutated.
//! - [`plugin`] – [`DevicePlugin`][plugin::DevicePlugin]: the
//!   `scan(notifier)` entry point.  Builds a fresh
//!   [`DeviceTree`][sgxdp_types::DeviceTree] each cycle and hands it to a
//!   [`Notifier`][sgxdp_middleware::Notifier], empty or not.
//! - [`manager`] – [`Manager`][manager::Manager]: runs a plugin under a
//!   resource namespace and logs registration changes.
//! - [`shutdown`] – [`Shutdown`][shutdown::Shutdown]: the explicit stop
//!   signal the scan loop waits on instead of blocking forever.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod config;
pub mod manager;
pub mod plugin;
pub mod shutdown;
pub mod telemetry;

pub use config::{PluginConfig, PublishMode};
pub use manager::Manager;
pub use plugin::DevicePlugin;
pub use shutdown::{Shutdown, ShutdownHandle, shutdown_channel};
pub use telemetry::{TracerProviderGuard, init_tracing};
