//! SGX capability probing via `CPUID`.
//!
//! The results are diagnostic only: nothing downstream is gated on them.
//! Device-node presence, not CPU flags, decides what gets advertised.
//!
//! Register decoding is left to `raw-cpuid`; this module only supplies the
//! register source.  [`HostCpuid`] executes the instruction, tests plug in
//! canned leaves through [`CpuidSource`].

use raw_cpuid::{CpuId, CpuIdReader, CpuIdResult, SgxSectionInfo};
use serde::Serialize;
use tracing::debug;

// Guards against a hypervisor that reports valid sections forever.
const MAX_EPC_SECTIONS: usize = 64;

/// Raw register values returned by one `CPUID` invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl From<CpuIdResult> for CpuidResult {
    fn from(r: CpuIdResult) -> Self {
        Self {
            eax: r.eax,
            ebx: r.ebx,
            ecx: r.ecx,
            edx: r.edx,
        }
    }
}

/// Anything that can answer `CPUID` queries.
pub trait CpuidSource: Send + Sync {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult;
}

/// Executes the real `CPUID` instruction.  Off x86_64 every leaf reads as
/// zero, which [`probe`] reports as "no SGX".
#[derive(Debug, Default, Clone, Copy)]
pub struct HostCpuid;

impl CpuidSource for HostCpuid {
    #[cfg(all(target_arch = "x86_64", not(target_env = "sgx")))]
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        raw_cpuid::CpuIdReaderNative.cpuid2(leaf, subleaf).into()
    }

    #[cfg(not(all(target_arch = "x86_64", not(target_env = "sgx"))))]
    fn cpuid(&self, _leaf: u32, _subleaf: u32) -> CpuidResult {
        CpuidResult::default()
    }
}

/// Lets `raw-cpuid` read from any [`CpuidSource`].
#[derive(Clone, Copy)]
struct SourceReader<'a>(&'a dyn CpuidSource);

impl CpuIdReader for SourceReader<'_> {
    fn cpuid2(&self, eax: u32, ecx: u32) -> CpuIdResult {
        let r = self.0.cpuid(eax, ecx);
        CpuIdResult {
            eax: r.eax,
            ebx: r.ebx,
            ecx: r.ecx,
            edx: r.edx,
        }
    }
}

/// One Enclave Page Cache region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpcSection {
    pub base: u64,
    pub size: u64,
}

/// Diagnostic record of the host's SGX support.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SgxCapabilities {
    pub available: bool,
    pub launch_control: bool,
    pub sgx1: bool,
    pub sgx2: bool,
    /// Maximum enclave size in bytes (64-bit mode), `0` when unknown.
    pub max_enclave_size_64: u64,
    pub epc_sections: Vec<EpcSection>,
}

impl SgxCapabilities {
    /// Total EPC bytes across all sections.
    pub fn epc_total(&self) -> u64 {
        self.epc_sections.iter().map(|s| s.size).sum()
    }
}

/// Read the SGX capability flags.  Never fails: missing features read as
/// `false`, missing sections as an empty list.
pub fn probe(source: &dyn CpuidSource) -> SgxCapabilities {
    let cpuid = CpuId::with_cpuid_reader(SourceReader(source));

    let (available, launch_control) = cpuid
        .get_extended_feature_info()
        .map_or((false, false), |f| (f.has_sgx(), f.has_sgx_lc()));
    let base = SgxCapabilities {
        available,
        launch_control,
        ..SgxCapabilities::default()
    };
    if !available {
        return base;
    }
    let Some(sgx) = cpuid.get_sgx_info() else {
        return base;
    };

    let max_bits = sgx.max_enclave_size_64bit();
    let max_enclave_size_64 = if max_bits == 0 || max_bits >= 64 {
        0
    } else {
        1u64 << max_bits
    };

    let epc_sections = sgx
        .iter()
        .take(MAX_EPC_SECTIONS)
        .filter_map(|section| match section {
            SgxSectionInfo::Epc(epc) => Some(EpcSection {
                base: epc.physical_base(),
                size: epc.size(),
            }),
            #[allow(unreachable_patterns)]
            _ => None,
        })
        .collect();

    SgxCapabilities {
        sgx1: sgx.has_sgx1(),
        sgx2: sgx.has_sgx2(),
        max_enclave_size_64,
        epc_sections,
        ..base
    }
}

/// Emit the capability record at debug level.
pub fn log_capabilities(caps: &SgxCapabilities) {
    debug!(
        available = caps.available,
        launch_control = caps.launch_control,
        sgx1 = caps.sgx1,
        sgx2 = caps.sgx2,
        max_enclave_size_64 = caps.max_enclave_size_64,
        epc_total = caps.epc_total(),
        "SGX capabilities"
    );
    for (index, section) in caps.epc_sections.iter().enumerate() {
        debug!(index, base = section.base, size = section.size, "SGX EPC section");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FEATURE_LEAF: u32 = 0x07;
    const SGX_LEAF: u32 = 0x12;

    fn max_leaf(leaf: u32) -> CpuidResult {
        CpuidResult {
            eax: leaf,
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct FakeCpuid {
        leaves: HashMap<(u32, u32), CpuidResult>,
    }

    impl FakeCpuid {
        fn with(mut self, leaf: u32, subleaf: u32, r: CpuidResult) -> Self {
            self.leaves.insert((leaf, subleaf), r);
            self
        }
    }

    impl CpuidSource for FakeCpuid {
        fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
            self.leaves.get(&(leaf, subleaf)).copied().unwrap_or_default()
        }
    }

    fn sgx_host() -> FakeCpuid {
        FakeCpuid::default()
            .with(0, 0, max_leaf(SGX_LEAF))
            .with(
                FEATURE_LEAF,
                0,
                CpuidResult {
                    ebx: 1 << 2,
                    ecx: 1 << 30,
                    ..Default::default()
                },
            )
            .with(
                SGX_LEAF,
                0,
                CpuidResult {
                    eax: 0b11,
                    edx: 36 << 8,
                    ..Default::default()
                },
            )
            .with(
                SGX_LEAF,
                2,
                CpuidResult {
                    eax: 0x7000_0001,
                    ebx: 0x1,
                    ecx: 0x0800_0001,
                    edx: 0,
                },
            )
            .with(
                SGX_LEAF,
                3,
                CpuidResult {
                    eax: 0x0000_0001,
                    ebx: 0x2,
                    ecx: 0x1000_0001,
                    edx: 0x1,
                },
            )
    }

    #[test]
    fn no_sgx_reads_as_false_not_error() {
        let caps = probe(&FakeCpuid::default());
        assert_eq!(caps, SgxCapabilities::default());
        assert_eq!(caps.epc_total(), 0);
    }

    #[test]
    fn full_sgx_host_is_decoded() {
        let caps = probe(&sgx_host());
        assert!(caps.available);
        assert!(caps.launch_control);
        assert!(caps.sgx1);
        assert!(caps.sgx2);
        assert_eq!(caps.max_enclave_size_64, 1 << 36);
        assert_eq!(caps.epc_sections.len(), 2);
        assert_eq!(
            caps.epc_sections[0],
            EpcSection {
                base: 0x1_7000_0000,
                size: 0x0800_0000,
            }
        );
        assert_eq!(
            caps.epc_sections[1],
            EpcSection {
                base: 0x2_0000_0000,
                size: 0x1_1000_0000,
            }
        );
        assert_eq!(caps.epc_total(), 0x0800_0000 + 0x1_1000_0000);
    }

    #[test]
    fn launch_control_without_sgx_is_still_reported() {
        let source = FakeCpuid::default().with(0, 0, max_leaf(SGX_LEAF)).with(
            FEATURE_LEAF,
            0,
            CpuidResult {
                ecx: 1 << 30,
                ..Default::default()
            },
        );
        let caps = probe(&source);
        assert!(!caps.available);
        assert!(caps.launch_control);
        assert!(caps.epc_sections.is_empty());
    }

    #[test]
    fn leaves_above_reported_maximum_are_ignored() {
        let source = sgx_host().with(0, 0, max_leaf(0x01));
        assert_eq!(probe(&source), SgxCapabilities::default());
    }

    #[test]
    fn sgx_leaf_missing_keeps_feature_flags() {
        let source = sgx_host().with(0, 0, max_leaf(FEATURE_LEAF));
        let caps = probe(&source);
        assert!(caps.available);
        assert!(!caps.sgx1);
        assert!(caps.epc_sections.is_empty());
    }

    #[test]
    fn host_probe_never_panics() {
        let caps = probe(&HostCpuid);
        log_capabilities(&caps);
    }
}
