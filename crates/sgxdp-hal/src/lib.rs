//! `sgxdp-hal` – Host Probing
//!
//! Everything that touches the host: CPU capability flags and device-node
//! presence.  Outputs are plain values; nothing here publishes or sleeps.
//!
//! # Modules
//!
//! - [`cpu`] – [`probe`][cpu::probe]: reads SGX support, launch control and
//!   EPC section sizes via `CPUID` for diagnostics.
//! - [`devfs`] – [`enumerate`][devfs::enumerate]: checks the required device
//!   nodes of a category and synthesises its instances.
//! - [`layout`] – [`CategoryLayout`][layout::CategoryLayout]: split
//!   (`enclave` + `provision`) or unified (`sgx`) category sets.
//! - [`tree`] – [`build_tree`][tree::build_tree]: aggregates every category
//!   into one [`DeviceTree`][sgxdp_types::DeviceTree].
//! - [`sim`] – [`SimDevfs`][sim::SimDevfs]: in-memory device filesystem.

pub mod cpu;
pub mod devfs;
pub mod layout;
pub mod sim;
pub mod tree;

pub use cpu::{CpuidSource, HostCpuid, SgxCapabilities};
pub use devfs::{CategorySpec, DevicePresence, HostDevfs, Presence};
pub use layout::{CategoryLayout, Limits};
pub use sim::SimDevfs;
pub use tree::{TreeBuilder, build_tree};
