// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The subset of the libvirt domain XML schema the converter emits.
//!
//! Field order is output order. Fields renamed with a leading `@` are XML
//! attributes and must precede child elements; `$text` is element content.

use serde::Serialize;

/// An element whose presence is its only content, e.g. `<acpi/>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Empty {}

/// A converted domain: the `<domain>` description plus the identity of the
/// instance it was produced from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    pub vmi_namespace: String,
    pub vmi_name: String,
    pub spec: DomainSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename = "domain")]
pub struct DomainSpec {
    #[serde(rename = "@type")]
    pub hypervisor: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub memory: Memory,
    #[serde(rename = "memoryBacking", skip_serializing_if = "Option::is_none")]
    pub memory_backing: Option<MemoryBacking>,
    pub os: Os,
    pub devices: Devices,
    pub clock: Clock,
    pub features: Features,
    pub cpu: Cpu,
    pub vcpu: Vcpu,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iothreads: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cputune: Option<CpuTune>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numatune: Option<NumaTune>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Memory {
    #[serde(rename = "@unit")]
    pub unit: String,
    #[serde(rename = "$text")]
    pub value: u64,
}

impl Memory {
    pub fn bytes(value: u64) -> Self {
        Self { unit: "b".to_owned(), value }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryBacking {
    pub hugepages: Hugepages,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Hugepages {
    pub page: HugePage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HugePage {
    #[serde(rename = "@size")]
    pub size: u64,
    #[serde(rename = "@unit")]
    pub unit: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Os {
    #[serde(rename = "type")]
    pub os_type: OsType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loader: Option<Loader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nvram: Option<Nvram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bios: Option<Bios>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OsType {
    #[serde(rename = "@arch")]
    pub arch: String,
    #[serde(rename = "@machine")]
    pub machine: String,
    #[serde(rename = "$text")]
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Loader {
    #[serde(rename = "@readonly")]
    pub readonly: String,
    #[serde(rename = "@secure")]
    pub secure: String,
    #[serde(rename = "@type")]
    pub loader_type: String,
    #[serde(rename = "$text", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Per-domain EFI variable store, seeded from `template` on first boot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Nvram {
    #[serde(rename = "@template", skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(rename = "$text")]
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bios {
    #[serde(rename = "@useserial")]
    pub use_serial: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Devices {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emulator: Option<String>,
    #[serde(rename = "disk")]
    pub disks: Vec<Disk>,
    #[serde(rename = "interface")]
    pub interfaces: Vec<Interface>,
    #[serde(rename = "input")]
    pub inputs: Vec<Input>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<Serial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console: Option<Console>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<Sound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpm: Option<Tpm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng: Option<Rng>,
    pub memballoon: MemBalloon,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Disk {
    #[serde(rename = "@device")]
    pub device: String,
    #[serde(rename = "@type")]
    pub disk_type: String,
    pub source: DiskSource,
    pub target: DiskTarget,
    pub driver: DiskDriver,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<Boot>,
    pub alias: Alias,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiskSource {
    #[serde(rename = "@file")]
    pub file: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiskTarget {
    #[serde(rename = "@bus")]
    pub bus: String,
    #[serde(rename = "@dev")]
    pub dev: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiskDriver {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type")]
    pub driver_type: String,
    #[serde(rename = "@cache", skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
    #[serde(rename = "@io", skip_serializing_if = "Option::is_none")]
    pub io: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Boot {
    #[serde(rename = "@order")]
    pub order: u32,
}

/// User-visible device alias; libvirt requires the `ua-` prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Alias {
    #[serde(rename = "@name")]
    pub name: String,
}

impl Alias {
    pub fn user(name: &str) -> Self {
        Self { name: format!("ua-{name}") }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Interface {
    #[serde(rename = "@type")]
    pub interface_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<Mac>,
    pub target: InterfaceTarget,
    pub model: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<Boot>,
    pub alias: Alias,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mac {
    #[serde(rename = "@address")]
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InterfaceTarget {
    #[serde(rename = "@dev")]
    pub dev: String,
    #[serde(rename = "@managed")]
    pub managed: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Model {
    #[serde(rename = "@type")]
    pub model_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Input {
    #[serde(rename = "@type")]
    pub input_type: String,
    #[serde(rename = "@bus")]
    pub bus: String,
    pub alias: Alias,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Serial {
    #[serde(rename = "@type")]
    pub serial_type: String,
    pub target: SerialTarget,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SerialTarget {
    #[serde(rename = "@port")]
    pub port: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Console {
    #[serde(rename = "@type")]
    pub console_type: String,
    pub target: ConsoleTarget,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConsoleTarget {
    #[serde(rename = "@type")]
    pub target_type: String,
    #[serde(rename = "@port")]
    pub port: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Video {
    pub model: VideoModel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VideoModel {
    #[serde(rename = "@type")]
    pub model_type: String,
    #[serde(rename = "@heads")]
    pub heads: u32,
    #[serde(rename = "@vram")]
    pub vram: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Sound {
    #[serde(rename = "@model")]
    pub model: String,
    pub alias: Alias,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tpm {
    #[serde(rename = "@model")]
    pub model: String,
    pub backend: TpmBackend,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TpmBackend {
    #[serde(rename = "@type")]
    pub backend_type: String,
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@persistent_state", skip_serializing_if = "Option::is_none")]
    pub persistent_state: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rng {
    #[serde(rename = "@model")]
    pub model: String,
    pub backend: RngBackend,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RngBackend {
    #[serde(rename = "@model")]
    pub model: String,
    #[serde(rename = "$text")]
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemBalloon {
    #[serde(rename = "@model")]
    pub model: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Clock {
    #[serde(rename = "@offset")]
    pub offset: String,
    #[serde(rename = "@timezone", skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(rename = "@adjustment", skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Features {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acpi: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apic: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smm: Option<Empty>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cpu {
    #[serde(rename = "@mode")]
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub topology: CpuTopology,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CpuTopology {
    #[serde(rename = "@sockets")]
    pub sockets: u32,
    #[serde(rename = "@cores")]
    pub cores: u32,
    #[serde(rename = "@threads")]
    pub threads: u32,
}

impl CpuTopology {
    /// Total vCPU count, or `None` if it does not fit in a `u32`.
    pub fn vcpus(&self) -> Option<u32> {
        self.sockets
            .checked_mul(self.cores)
            .and_then(|n| n.checked_mul(self.threads))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Vcpu {
    #[serde(rename = "@placement")]
    pub placement: String,
    #[serde(rename = "$text")]
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CpuTune {
    #[serde(rename = "vcpupin")]
    pub vcpu_pins: Vec<VcpuPin>,
    #[serde(rename = "emulatorpin", skip_serializing_if = "Option::is_none")]
    pub emulator_pin: Option<EmulatorPin>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VcpuPin {
    #[serde(rename = "@vcpu")]
    pub vcpu: u32,
    #[serde(rename = "@cpuset")]
    pub cpuset: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmulatorPin {
    #[serde(rename = "@cpuset")]
    pub cpuset: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NumaTune {
    pub memory: NumaTuneMemory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NumaTuneMemory {
    #[serde(rename = "@mode")]
    pub mode: String,
    #[serde(rename = "@nodeset")]
    pub nodeset: String,
}
