// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side facts handed to the converter alongside the instance.

use std::path::PathBuf;

use crate::cpuset::CpuSet;

/// A NUMA cell: a group of host CPUs the guest may be pinned to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub id: u32,
    pub cpus: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topology {
    pub numa_cells: Vec<Cell>,
}

/// Firmware images used when the guest boots with EFI. Unset paths leave
/// the choice to libvirt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EfiConfiguration {
    pub code: Option<PathBuf>,
    pub vars: Option<PathBuf>,
}

/// Everything about the host that conversion needs. Built once per
/// conversion and read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionContext {
    cpu_set: CpuSet,
    topology: Topology,
    efi: EfiConfiguration,
}

impl ConversionContext {
    /// Describes a host whose usable CPUs form a single NUMA cell. An empty
    /// CPU set yields one empty cell and disables pinning.
    pub fn new(cpu_set: CpuSet, efi: EfiConfiguration) -> Self {
        let cell = Cell { id: 0, cpus: cpu_set.iter().collect() };
        Self { cpu_set, topology: Topology { numa_cells: vec![cell] }, efi }
    }

    pub fn cpu_set(&self) -> &CpuSet {
        &self.cpu_set
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn efi(&self) -> &EfiConfiguration {
        &self.efi
    }

    /// Whether vCPUs are pinned to host CPUs.
    pub fn pinning_enabled(&self) -> bool {
        !self.cpu_set.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn single_cell_enumerates_cpu_set() {
        let ctx = ConversionContext::new(
            CpuSet::from_str("3,0-1").unwrap(),
            EfiConfiguration::default(),
        );
        assert!(ctx.pinning_enabled());
        assert_eq!(
            ctx.topology().numa_cells,
            vec![Cell { id: 0, cpus: vec![0, 1, 3] }]
        );
    }

    #[test]
    fn empty_cpu_set_yields_empty_cell() {
        let ctx =
            ConversionContext::new(CpuSet::new(), EfiConfiguration::default());
        assert!(!ctx.pinning_enabled());
        assert_eq!(ctx.topology().numa_cells, vec![Cell::default()]);
        assert_eq!(ctx.efi(), &EfiConfiguration::default());
    }
}
