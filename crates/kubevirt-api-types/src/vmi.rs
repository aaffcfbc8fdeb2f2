// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The VirtualMachineInstance kind: the low-level, fully described shape of
//! a single guest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Empty, ObjectMeta, Quantity, TypeMeta};

/// Resource name of the CPU entries in requests/limits.
pub const RESOURCE_CPU: &str = "cpu";
/// Resource name of the memory entries in requests/limits.
pub const RESOURCE_MEMORY: &str = "memory";

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct VirtualMachineInstance {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VirtualMachineInstanceSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    #[serde(default)]
    pub domain: DomainSpec,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub scheduler_name: String,
    pub termination_grace_period_seconds: Option<i64>,
    pub hostname: Option<String>,
    pub subdomain: Option<String>,
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    #[serde(default)]
    pub resources: ResourceRequirements,
    pub cpu: Option<Cpu>,
    pub memory: Option<Memory>,
    pub machine: Option<Machine>,
    pub firmware: Option<Firmware>,
    pub clock: Option<Clock>,
    pub features: Option<Features>,
    #[serde(default)]
    pub devices: Devices,
    pub io_threads_policy: Option<IoThreadsPolicy>,
    pub launch_security: Option<LaunchSecurity>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: BTreeMap<String, Quantity>,
    #[serde(default)]
    pub limits: BTreeMap<String, Quantity>,
}

/// Guest CPU shape. Zero counts mean "unset".
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    #[serde(default)]
    pub sockets: u32,
    #[serde(default)]
    pub cores: u32,
    #[serde(default)]
    pub threads: u32,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub dedicated_cpu_placement: bool,
    #[serde(default)]
    pub isolate_emulator_thread: bool,
    pub numa: Option<Numa>,
    pub realtime: Option<Realtime>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Numa {
    pub guest_mapping_passthrough: Option<Empty>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Realtime {
    pub mask: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Memory {
    pub guest: Option<Quantity>,
    pub hugepages: Option<Hugepages>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hugepages {
    pub page_size: Quantity,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Machine {
    #[serde(default, rename = "type")]
    pub machine_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Firmware {
    pub uuid: Option<String>,
    pub serial: Option<String>,
    pub bootloader: Option<Bootloader>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Bootloader {
    pub bios: Option<Bios>,
    pub efi: Option<Efi>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bios {
    pub use_serial: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Efi {
    pub secure_boot: Option<bool>,
}

/// Guest clock offset. At most one of the two is expected to be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Clock {
    pub utc: Option<ClockOffsetUtc>,
    pub timezone: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockOffsetUtc {
    pub offset_seconds: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Features {
    pub acpi: Option<FeatureState>,
    pub apic: Option<FeatureState>,
    pub smm: Option<FeatureState>,
}

/// A toggleable feature; present without `enabled` means enabled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureState {
    pub enabled: Option<bool>,
}

impl FeatureState {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IoThreadsPolicy {
    Shared,
    Auto,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LaunchSecurity {
    pub sev: Option<Sev>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Sev {
    pub policy: Option<SevPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SevPolicy {
    pub encrypted_state: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Devices {
    #[serde(default)]
    pub disks: Vec<Disk>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub gpus: Vec<Gpu>,
    #[serde(default)]
    pub host_devices: Vec<HostDevice>,
    pub autoattach_graphics_device: Option<bool>,
    pub autoattach_mem_balloon: Option<bool>,
    pub autoattach_pod_interface: Option<bool>,
    pub autoattach_serial_console: Option<bool>,
    pub autoattach_input_device: Option<bool>,
    pub use_virtio_transitional: Option<bool>,
    pub block_multi_queue: Option<bool>,
    pub network_interface_multiqueue: Option<bool>,
    pub rng: Option<Rng>,
    pub tpm: Option<Tpm>,
    pub sound: Option<SoundDevice>,
}

/// Bus a disk-like device attaches to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiskBus {
    Virtio,
    Sata,
    Scsi,
    Usb,
}

/// A guest-visible disk. Exactly one of `disk`, `cdrom` and `lun` selects
/// the device type; none means a plain disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    pub disk: Option<DiskTarget>,
    pub cdrom: Option<CdRomTarget>,
    pub lun: Option<LunTarget>,
    pub boot_order: Option<u32>,
    pub serial: Option<String>,
    pub cache: Option<String>,
    pub io: Option<String>,
    #[serde(rename = "dedicatedIOThread")]
    pub dedicated_io_thread: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiskTarget {
    pub bus: Option<DiskBus>,
    pub readonly: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CdRomTarget {
    pub bus: Option<DiskBus>,
    pub readonly: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LunTarget {
    pub bus: Option<DiskBus>,
    pub readonly: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,
    pub model: Option<String>,
    pub mac_address: Option<String>,
    pub boot_order: Option<u32>,
    pub masquerade: Option<Empty>,
    pub bridge: Option<Empty>,
    pub slirp: Option<Empty>,
    pub sriov: Option<Empty>,
    pub macvtap: Option<Empty>,
    pub passt: Option<Empty>,
    pub binding: Option<PluginBinding>,
}

impl Interface {
    /// Whether the interface names how it is bound to its network.
    pub fn has_binding(&self) -> bool {
        self.masquerade.is_some()
            || self.bridge.is_some()
            || self.slirp.is_some()
            || self.sriov.is_some()
            || self.macvtap.is_some()
            || self.passt.is_some()
            || self.binding.is_some()
    }
}

/// A network binding provided by a named plugin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluginBinding {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Input {
    pub name: String,
    #[serde(default, rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub bus: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gpu {
    pub name: String,
    pub device_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDevice {
    pub name: String,
    pub device_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rng {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Tpm {
    pub persistent: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SoundDevice {
    pub name: String,
    pub model: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Network {
    pub name: String,
    pub pod: Option<Empty>,
    pub multus: Option<MultusNetwork>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultusNetwork {
    pub network_name: String,
}

/// A named storage source backing one disk. Exactly one source is expected.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub container_disk: Option<ContainerDiskSource>,
    pub persistent_volume_claim: Option<PersistentVolumeClaimSource>,
    pub data_volume: Option<DataVolumeSource>,
    pub host_disk: Option<HostDiskSource>,
    pub empty_disk: Option<EmptyDiskSource>,
    pub cloud_init_no_cloud: Option<CloudInitNoCloudSource>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContainerDiskSource {
    pub image: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSource {
    pub claim_name: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataVolumeSource {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostDiskSource {
    pub path: String,
    #[serde(default, rename = "type")]
    pub disk_type: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EmptyDiskSource {
    pub capacity: Quantity,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudInitNoCloudSource {
    pub user_data: Option<String>,
    pub user_data_base64: Option<String>,
    pub network_data: Option<String>,
}
