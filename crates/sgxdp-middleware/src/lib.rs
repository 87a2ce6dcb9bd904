//! `sgxdp-middleware` – The Notifier Seam
//!
//! Carries device-tree snapshots from the scan engine to whoever registers
//! them with the cluster, without the engine caring who that is.
//!
//! # Modules
//!
//! - [`notifier`] – the [`Notifier`] trait and a broadcast-channel backed
//!   implementation for fan-out to several consumers.
//! - [`registry`] – [`AdvertisementRegistry`]: remembers the last advertised
//!   state per resource name and diffs each new snapshot against it.

pub mod notifier;
pub mod registry;

pub use notifier::{BroadcastNotifier, Notifier, TreeSubscriber, TreeUpdate};
pub use registry::{AdvertisementChange, AdvertisementRegistry};
