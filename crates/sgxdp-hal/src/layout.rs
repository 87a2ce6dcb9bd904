//! Mapping from the configured category layout to [`CategorySpec`]s.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sgxdp_types::ResourceCategory;

use crate::devfs::CategorySpec;

/// `sgx/enclave`, relative to the devfs root.
pub const ENCLAVE_NODE: &str = "sgx/enclave";
/// `sgx/provision`, relative to the devfs root.
pub const PROVISION_NODE: &str = "sgx/provision";

/// How the SGX device nodes are grouped into advertised categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryLayout {
    /// `enclave` and `provision` are advertised independently.
    #[default]
    Split,
    /// A single `sgx` category whose instances bind both nodes together.
    Unified,
}

/// Per-category instance limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub enclave: u32,
    pub provision: u32,
}

impl CategoryLayout {
    /// Build the category specs for this layout.  The unified category uses
    /// the enclave limit.
    pub fn specs(&self, limits: Limits) -> Vec<CategorySpec> {
        match self {
            CategoryLayout::Split => vec![
                CategorySpec::new(
                    ResourceCategory::enclave(),
                    vec![PathBuf::from(ENCLAVE_NODE)],
                    limits.enclave,
                ),
                CategorySpec::new(
                    ResourceCategory::provision(),
                    vec![PathBuf::from(PROVISION_NODE)],
                    limits.provision,
                ),
            ],
            CategoryLayout::Unified => vec![CategorySpec::new(
                ResourceCategory::unified(),
                vec![PathBuf::from(ENCLAVE_NODE), PathBuf::from(PROVISION_NODE)],
                limits.enclave,
            )],
        }
    }
}
