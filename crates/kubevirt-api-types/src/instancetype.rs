// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instance types and preferences: reusable fragments merged into a
//! VirtualMachine's template.
//!
//! The namespaced and cluster-scoped kinds of each class have the same
//! shape, so each class is modeled by a single object type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vmi::{
    ClockOffsetUtc, DiskBus, FeatureState, Gpu, HostDevice, Hugepages,
    IoThreadsPolicy, LaunchSecurity, Numa, Realtime, Rng, Tpm,
};
use crate::{Empty, ObjectMeta, Quantity, TypeMeta};

/// A `VirtualMachineInstancetype` or `VirtualMachineClusterInstancetype`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct VirtualMachineInstancetype {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: InstancetypeSpec,
}

/// Authoritative resource shape. Every value here is asserted onto the
/// instance; setting the same field in the template is a conflict.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancetypeSpec {
    pub cpu: CpuInstancetype,
    pub memory: MemoryInstancetype,
    #[serde(default)]
    pub gpus: Vec<Gpu>,
    #[serde(default)]
    pub host_devices: Vec<HostDevice>,
    pub io_threads_policy: Option<IoThreadsPolicy>,
    pub launch_security: Option<LaunchSecurity>,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub scheduler_name: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInstancetype {
    /// Number of guest vCPUs.
    pub guest: u32,
    pub model: Option<String>,
    #[serde(rename = "dedicatedCPUPlacement")]
    pub dedicated_cpu_placement: Option<bool>,
    pub isolate_emulator_thread: Option<bool>,
    pub numa: Option<Numa>,
    pub realtime: Option<Realtime>,
    pub max_sockets: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInstancetype {
    pub guest: Quantity,
    pub hugepages: Option<Hugepages>,
    /// Percentage by which the memory request is lowered below `guest`.
    #[serde(default)]
    pub overcommit_percent: u8,
}

/// A `VirtualMachinePreference` or `VirtualMachineClusterPreference`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct VirtualMachinePreference {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PreferenceSpec,
}

/// Defaults for an instance. A preference only fills fields the template
/// leaves unset and never conflicts with it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSpec {
    pub clock: Option<ClockPreferences>,
    pub cpu: Option<CpuPreferences>,
    pub devices: Option<DevicePreferences>,
    pub features: Option<FeaturePreferences>,
    pub firmware: Option<FirmwarePreferences>,
    pub machine: Option<MachinePreferences>,
    pub preferred_subdomain: Option<String>,
    pub preferred_termination_grace_period_seconds: Option<i64>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockPreferences {
    pub preferred_clock_offset: Option<ClockOffset>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClockOffset {
    pub utc: Option<ClockOffsetUtc>,
    pub timezone: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuPreferences {
    #[serde(rename = "preferredCPUTopology")]
    pub preferred_cpu_topology: Option<PreferredCpuTopology>,
    pub spread_options: Option<SpreadOptions>,
}

/// How guest vCPUs are laid out across sockets, cores and threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum PreferredCpuTopology {
    #[default]
    #[serde(rename = "preferSockets", alias = "sockets")]
    Sockets,
    #[serde(rename = "preferCores", alias = "cores")]
    Cores,
    #[serde(rename = "preferThreads", alias = "threads")]
    Threads,
    #[serde(rename = "preferSpread", alias = "spread")]
    Spread,
    #[serde(rename = "preferAny", alias = "any")]
    Any,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpreadOptions {
    pub across: Option<SpreadAcross>,
    pub ratio: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum SpreadAcross {
    SocketsCoresThreads,
    #[default]
    SocketsCores,
    CoresThreads,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePreferences {
    pub preferred_autoattach_graphics_device: Option<bool>,
    pub preferred_autoattach_mem_balloon: Option<bool>,
    pub preferred_autoattach_pod_interface: Option<bool>,
    pub preferred_autoattach_serial_console: Option<bool>,
    pub preferred_autoattach_input_device: Option<bool>,
    pub preferred_use_virtio_transitional: Option<bool>,
    pub preferred_block_multi_queue: Option<bool>,
    pub preferred_network_interface_multi_queue: Option<bool>,
    pub preferred_disk_bus: Option<DiskBus>,
    pub preferred_cdrom_bus: Option<DiskBus>,
    pub preferred_lun_bus: Option<DiskBus>,
    pub preferred_disk_cache: Option<String>,
    #[serde(rename = "preferredDiskIO")]
    pub preferred_disk_io: Option<String>,
    pub preferred_disk_dedicated_io_thread: Option<bool>,
    pub preferred_interface_model: Option<String>,
    pub preferred_interface_masquerade: Option<Empty>,
    pub preferred_input_bus: Option<String>,
    pub preferred_input_type: Option<String>,
    pub preferred_sound_model: Option<String>,
    pub preferred_rng: Option<Rng>,
    #[serde(rename = "preferredTPM")]
    pub preferred_tpm: Option<Tpm>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePreferences {
    pub preferred_acpi: Option<FeatureState>,
    pub preferred_apic: Option<FeatureState>,
    pub preferred_smm: Option<FeatureState>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwarePreferences {
    pub preferred_use_bios: Option<bool>,
    pub preferred_use_bios_serial: Option<bool>,
    pub preferred_use_efi: Option<bool>,
    pub preferred_use_secure_boot: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachinePreferences {
    pub preferred_machine_type: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_instancetype() {
        let raw = r#"
apiVersion: instancetype.kubevirt.io/v1beta1
kind: VirtualMachineClusterInstancetype
metadata:
  name: u1.medium
spec:
  cpu:
    guest: 4
    dedicatedCPUPlacement: true
  memory:
    guest: 4Gi
    overcommitPercent: 10
  ioThreadsPolicy: shared
"#;
        let it: VirtualMachineInstancetype = serde_yaml::from_str(raw).unwrap();
        assert_eq!(it.metadata.name, "u1.medium");
        assert_eq!(it.spec.cpu.guest, 4);
        assert_eq!(it.spec.cpu.dedicated_cpu_placement, Some(true));
        assert_eq!(it.spec.memory.guest.bytes(), 4 << 30);
        assert_eq!(it.spec.memory.overcommit_percent, 10);
        assert_eq!(it.spec.io_threads_policy, Some(IoThreadsPolicy::Shared));
    }

    #[test]
    fn instancetype_requires_guest_resources() {
        let raw = "spec:\n  cpu:\n    guest: 2\n";
        assert!(serde_yaml::from_str::<VirtualMachineInstancetype>(raw).is_err());
    }

    #[test]
    fn parse_preference() {
        let raw = r#"
apiVersion: instancetype.kubevirt.io/v1beta1
kind: VirtualMachinePreference
metadata:
  name: fedora
spec:
  cpu:
    preferredCPUTopology: preferCores
  devices:
    preferredDiskBus: virtio
    preferredInterfaceModel: virtio
    preferredDiskIO: native
    preferredTPM: {}
  firmware:
    preferredUseEfi: true
"#;
        let pref: VirtualMachinePreference = serde_yaml::from_str(raw).unwrap();
        let cpu = pref.spec.cpu.unwrap();
        assert_eq!(cpu.preferred_cpu_topology, Some(PreferredCpuTopology::Cores));

        let devices = pref.spec.devices.unwrap();
        assert_eq!(devices.preferred_disk_bus, Some(DiskBus::Virtio));
        assert_eq!(devices.preferred_disk_io.as_deref(), Some("native"));
        assert!(devices.preferred_tpm.is_some());
        assert_eq!(pref.spec.firmware.unwrap().preferred_use_efi, Some(true));
    }

    #[test]
    fn deprecated_topology_names() {
        let t: PreferredCpuTopology = serde_yaml::from_str("threads").unwrap();
        assert_eq!(t, PreferredCpuTopology::Threads);
        let t: PreferredCpuTopology = serde_yaml::from_str("preferAny").unwrap();
        assert_eq!(t, PreferredCpuTopology::Any);
    }
}
