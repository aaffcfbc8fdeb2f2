// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Translation of a resolved VirtualMachineInstance into a libvirt domain.

use kubevirt_api_types::vmi::{
    self, DiskBus, IoThreadsPolicy, VirtualMachineInstance, RESOURCE_CPU,
    RESOURCE_MEMORY,
};
use serde::{Deserialize, Serialize};
use slog::{debug, Logger};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::context::ConversionContext;
use crate::schema::{
    Alias, Bios, Boot, Clock, Console, ConsoleTarget, Cpu, CpuTopology,
    CpuTune, Devices, Disk, DiskDriver, DiskSource, DiskTarget, Domain,
    DomainSpec, EmulatorPin, Empty, Features, HugePage, Hugepages, Input,
    Interface, InterfaceTarget, Loader, Mac, MemBalloon, Memory,
    MemoryBacking, Model, NumaTune, NumaTuneMemory, Nvram, Os, OsType, Rng,
    RngBackend, Serial, SerialTarget, Sound, Tpm, TpmBackend, VcpuPin, Vcpu,
    Video, VideoModel,
};

const DEFAULT_NAMESPACE: &str = "default";
const CONTAINER_DISK_DIR: &str = "/var/run/kubevirt-ephemeral-disks/disk-data";
const EMPTY_DISK_DIR: &str = "/var/run/kubevirt-ephemeral-disks/empty-disk";
const CLOUD_INIT_DIR: &str = "/var/run/kubevirt-ephemeral-disks/cloud-init-data";
const PVC_DISK_DIR: &str = "/var/run/kubevirt-private/vmi-disks";
const NVRAM_DIR: &str = "/var/lib/libvirt/qemu/nvram";

/// Errors that can arise while converting an instance into a domain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("instance has no name")]
    MissingName,

    #[error("instance does not specify guest memory or a memory request")]
    MissingMemory,

    #[error("disk {0:?} has no matching volume")]
    MissingVolume(String),

    #[error("interface {0:?} has no matching network")]
    MissingNetwork(String),

    #[error("volume {0:?} has no supported source")]
    UnsupportedVolume(String),

    #[error("{0} are not supported")]
    Unsupported(&'static str),

    #[error(
        "topology of {sockets} sockets, {cores} cores and {threads} threads \
         has too many vCPUs"
    )]
    TooManyVcpus { sockets: u32, cores: u32, threads: u32 },

    #[error("{needed} vCPUs need pinning but only {available} CPUs are available")]
    NotEnoughCpus { needed: usize, available: usize },
}

/// Guest architectures the converter can target.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    Display,
    EnumString,
)]
pub enum Arch {
    #[default]
    #[serde(rename = "x86_64")]
    #[strum(serialize = "x86_64")]
    X86_64,
    #[serde(rename = "aarch64")]
    #[strum(serialize = "aarch64")]
    Aarch64,
    #[serde(rename = "s390x")]
    #[strum(serialize = "s390x")]
    S390x,
}

impl Arch {
    pub fn default_machine_type(&self) -> &'static str {
        match self {
            Arch::X86_64 => "q35",
            Arch::Aarch64 => "virt",
            Arch::S390x => "s390-ccw-virtio",
        }
    }
}

/// Turns a fully resolved instance into a hypervisor domain.
pub trait Converter {
    fn convert(
        &self,
        vmi: &VirtualMachineInstance,
        ctx: &ConversionContext,
    ) -> Result<Domain, ConversionError>;
}

/// Converter producing a KVM domain for libvirt.
pub struct LibvirtConverter {
    arch: Arch,
    emulator: Option<String>,
    log: Logger,
}

impl LibvirtConverter {
    pub fn new(arch: Arch, log: Logger) -> Self {
        Self { arch, emulator: None, log }
    }

    /// Sets the `<emulator>` binary path emitted in the domain.
    pub fn with_emulator(mut self, emulator: impl Into<String>) -> Self {
        self.emulator = Some(emulator.into());
        self
    }
}

impl Converter for LibvirtConverter {
    fn convert(
        &self,
        vmi: &VirtualMachineInstance,
        ctx: &ConversionContext,
    ) -> Result<Domain, ConversionError> {
        let meta = &vmi.metadata;
        if meta.name.is_empty() {
            return Err(ConversionError::MissingName);
        }
        let namespace = if meta.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            meta.namespace.as_str()
        };
        let name = format!("{namespace}_{}", meta.name);

        let domain = &vmi.spec.domain;
        if !domain.devices.gpus.is_empty() {
            return Err(ConversionError::Unsupported("GPUs"));
        }
        if !domain.devices.host_devices.is_empty() {
            return Err(ConversionError::Unsupported("host devices"));
        }
        if domain.launch_security.is_some() {
            return Err(ConversionError::Unsupported("launch security options"));
        }

        let topology = cpu_topology(domain);
        let vcpus = topology.vcpus().ok_or(ConversionError::TooManyVcpus {
            sockets: topology.sockets,
            cores: topology.cores,
            threads: topology.threads,
        })?;
        let efi = domain
            .firmware
            .as_ref()
            .and_then(|f| f.bootloader.as_ref())
            .and_then(|b| b.efi.as_ref());
        let secure_boot =
            efi.map_or(false, |efi| efi.secure_boot.unwrap_or(true));

        let spec = DomainSpec {
            hypervisor: "kvm".to_owned(),
            name: name.clone(),
            uuid: domain.firmware.as_ref().and_then(|f| f.uuid.clone()),
            memory: Memory::bytes(guest_memory(domain)?),
            memory_backing: domain
                .memory
                .as_ref()
                .and_then(|m| m.hugepages.as_ref())
                .map(|h| MemoryBacking {
                    hugepages: Hugepages {
                        page: HugePage {
                            size: h.page_size.bytes() / 1024,
                            unit: "KiB".to_owned(),
                        },
                    },
                }),
            os: self.os(&name, domain, ctx, secure_boot),
            devices: self.devices(vmi)?,
            clock: clock(domain.clock.as_ref()),
            features: features(domain.features.as_ref(), secure_boot),
            cpu: cpu(domain.cpu.as_ref(), topology),
            vcpu: Vcpu { placement: "static".to_owned(), count: vcpus },
            iothreads: iothreads(domain),
            cputune: None,
            numatune: None,
        };

        let spec = self.pin(spec, domain, ctx)?;
        Ok(Domain {
            vmi_namespace: namespace.to_owned(),
            vmi_name: meta.name.clone(),
            spec,
        })
    }
}

impl LibvirtConverter {
    fn os(
        &self,
        name: &str,
        domain: &vmi::DomainSpec,
        ctx: &ConversionContext,
        secure_boot: bool,
    ) -> Os {
        let machine = domain
            .machine
            .as_ref()
            .map(|m| m.machine_type.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.arch.default_machine_type());

        let bootloader =
            domain.firmware.as_ref().and_then(|f| f.bootloader.as_ref());
        let (loader, nvram) = match bootloader.and_then(|b| b.efi.as_ref()) {
            Some(_) => {
                let efi = ctx.efi();
                let loader = Loader {
                    readonly: "yes".to_owned(),
                    secure: yes_no(secure_boot),
                    loader_type: "pflash".to_owned(),
                    path: efi.code.as_ref().map(|p| p.display().to_string()),
                };
                let nvram = Nvram {
                    template: efi.vars.as_ref().map(|p| p.display().to_string()),
                    path: format!("{NVRAM_DIR}/{name}_VARS.fd"),
                };
                (Some(loader), Some(nvram))
            }
            None => (None, None),
        };
        let bios = bootloader
            .and_then(|b| b.bios.as_ref())
            .filter(|b| b.use_serial == Some(true))
            .map(|_| Bios { use_serial: yes_no(true) });

        Os {
            os_type: OsType {
                arch: self.arch.to_string(),
                machine: machine.to_owned(),
                value: "hvm".to_owned(),
            },
            loader,
            nvram,
            bios,
        }
    }

    fn devices(
        &self,
        vmi: &VirtualMachineInstance,
    ) -> Result<Devices, ConversionError> {
        let devices = &vmi.spec.domain.devices;
        let transitional = devices.use_virtio_transitional == Some(true);
        let mut names = DeviceNames::default();

        let mut disks = Vec::with_capacity(devices.disks.len());
        for disk in &devices.disks {
            let volume = vmi
                .spec
                .volumes
                .iter()
                .find(|v| v.name == disk.name)
                .ok_or_else(|| ConversionError::MissingVolume(disk.name.clone()))?;
            disks.push(convert_disk(vmi, disk, volume, &mut names)?);
        }

        let mut interfaces = Vec::with_capacity(devices.interfaces.len());
        for (idx, iface) in devices.interfaces.iter().enumerate() {
            if !vmi.spec.networks.iter().any(|n| n.name == iface.name) {
                return Err(ConversionError::MissingNetwork(iface.name.clone()));
            }
            let model = match iface.model.as_deref() {
                None | Some("virtio") => virtio_model(transitional),
                Some(other) => other.to_owned(),
            };
            interfaces.push(Interface {
                interface_type: "ethernet".to_owned(),
                mac: iface
                    .mac_address
                    .as_ref()
                    .map(|address| Mac { address: address.clone() }),
                target: InterfaceTarget {
                    dev: format!("tap{idx}"),
                    managed: "no".to_owned(),
                },
                model: Model { model_type: model },
                boot: iface.boot_order.map(|order| Boot { order }),
                alias: Alias::user(&iface.name),
            });
        }

        let mut inputs: Vec<Input> = devices
            .inputs
            .iter()
            .map(|input| Input {
                input_type: non_empty_or(&input.input_type, "tablet"),
                bus: non_empty_or(&input.bus, "usb"),
                alias: Alias::user(&input.name),
            })
            .collect();
        if inputs.is_empty() && devices.autoattach_input_device == Some(true) {
            inputs.push(Input {
                input_type: "tablet".to_owned(),
                bus: "usb".to_owned(),
                alias: Alias::user("default-0"),
            });
        }

        let (serial, console) = if devices.autoattach_serial_console
            != Some(false)
        {
            (
                Some(Serial {
                    serial_type: "pty".to_owned(),
                    target: SerialTarget { port: 0 },
                }),
                Some(Console {
                    console_type: "pty".to_owned(),
                    target: ConsoleTarget {
                        target_type: "serial".to_owned(),
                        port: 0,
                    },
                }),
            )
        } else {
            (None, None)
        };

        let video = (devices.autoattach_graphics_device != Some(false)).then(
            || Video {
                model: VideoModel {
                    model_type: match self.arch {
                        Arch::X86_64 => "vga".to_owned(),
                        _ => "virtio".to_owned(),
                    },
                    heads: 1,
                    vram: 16384,
                },
            },
        );

        let memballoon = MemBalloon {
            model: if devices.autoattach_mem_balloon == Some(false) {
                "none".to_owned()
            } else {
                virtio_model(transitional)
            },
        };

        debug!(self.log, "converted devices";
            "disks" => disks.len(),
            "interfaces" => interfaces.len(),
            "inputs" => inputs.len(),
        );

        Ok(Devices {
            emulator: self.emulator.clone(),
            disks,
            interfaces,
            inputs,
            serial,
            console,
            video,
            sound: devices.sound.as_ref().map(|sound| Sound {
                model: sound.model.clone().unwrap_or_else(|| "ich9".to_owned()),
                alias: Alias::user(&sound.name),
            }),
            tpm: devices.tpm.as_ref().map(|tpm| Tpm {
                model: "tpm-tis".to_owned(),
                backend: TpmBackend {
                    backend_type: "emulator".to_owned(),
                    version: "2.0".to_owned(),
                    persistent_state: (tpm.persistent == Some(true))
                        .then(|| yes_no(true)),
                },
            }),
            rng: devices.rng.as_ref().map(|_| Rng {
                model: virtio_model(transitional),
                backend: RngBackend {
                    model: "random".to_owned(),
                    source: "/dev/urandom".to_owned(),
                },
            }),
            memballoon,
        })
    }

    /// Pins each vCPU to one CPU of the first NUMA cell and binds guest
    /// memory to that cell. An emulator thread that must be isolated takes
    /// the next CPU after the vCPUs.
    fn pin(
        &self,
        mut spec: DomainSpec,
        domain: &vmi::DomainSpec,
        ctx: &ConversionContext,
    ) -> Result<DomainSpec, ConversionError> {
        let Some(cell) = ctx.topology().numa_cells.first() else {
            return Ok(spec);
        };
        if !ctx.pinning_enabled() || cell.cpus.is_empty() {
            return Ok(spec);
        }

        let isolate_emulator =
            domain.cpu.as_ref().map_or(false, |c| c.isolate_emulator_thread);
        let vcpus = spec.vcpu.count as usize;
        let needed = vcpus + usize::from(isolate_emulator);
        if needed > cell.cpus.len() {
            return Err(ConversionError::NotEnoughCpus {
                needed,
                available: cell.cpus.len(),
            });
        }

        let vcpu_pins = cell.cpus[..vcpus]
            .iter()
            .zip(0u32..)
            .map(|(cpu, vcpu)| VcpuPin { vcpu, cpuset: cpu.to_string() })
            .collect();
        let emulator_pin = isolate_emulator
            .then(|| EmulatorPin { cpuset: cell.cpus[vcpus].to_string() });

        debug!(self.log, "pinning vCPUs";
            "cell" => cell.id,
            "vcpus" => vcpus,
            "isolate_emulator" => isolate_emulator,
        );

        spec.cputune = Some(CpuTune { vcpu_pins, emulator_pin });
        spec.numatune = Some(NumaTune {
            memory: NumaTuneMemory {
                mode: "strict".to_owned(),
                nodeset: cell.id.to_string(),
            },
        });
        Ok(spec)
    }
}

/// Allocates guest device names per bus prefix (`vda`, `vdb`, ... `sda`).
#[derive(Default)]
struct DeviceNames {
    virtio: usize,
    scsi: usize,
}

impl DeviceNames {
    fn next(&mut self, bus: DiskBus) -> String {
        let (prefix, counter) = match bus {
            DiskBus::Virtio => ("vd", &mut self.virtio),
            DiskBus::Sata | DiskBus::Scsi | DiskBus::Usb => {
                ("sd", &mut self.scsi)
            }
        };
        let name = device_name(prefix, *counter);
        *counter += 1;
        name
    }
}

/// Linux-style disk name for the `index`-th device on a bus: a, b, ... z,
/// aa, ab, ...
fn device_name(prefix: &str, index: usize) -> String {
    let mut suffix = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        n -= 1;
        suffix.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    suffix.reverse();
    format!("{prefix}{}", String::from_utf8_lossy(&suffix))
}

fn convert_disk(
    vmi: &VirtualMachineInstance,
    disk: &vmi::Disk,
    volume: &vmi::Volume,
    names: &mut DeviceNames,
) -> Result<Disk, ConversionError> {
    let (device, bus, readonly) = if let Some(cdrom) = &disk.cdrom {
        (
            "cdrom",
            cdrom.bus.unwrap_or(DiskBus::Sata),
            cdrom.readonly.unwrap_or(true),
        )
    } else if let Some(lun) = &disk.lun {
        ("disk", lun.bus.unwrap_or(DiskBus::Scsi), lun.readonly.unwrap_or(false))
    } else {
        let target = disk.disk.clone().unwrap_or_default();
        (
            "disk",
            target.bus.unwrap_or(DiskBus::Virtio),
            target.readonly.unwrap_or(false),
        )
    };

    let (file, driver_type, source_readonly) = disk_source(vmi, volume)?;

    Ok(Disk {
        device: device.to_owned(),
        disk_type: "file".to_owned(),
        source: DiskSource { file },
        target: DiskTarget { bus: bus.to_string(), dev: names.next(bus) },
        driver: DiskDriver {
            name: "qemu".to_owned(),
            driver_type: driver_type.to_owned(),
            cache: disk.cache.clone(),
            io: disk.io.clone(),
        },
        readonly: (readonly || source_readonly).then_some(Empty {}),
        serial: disk.serial.clone(),
        boot: disk.boot_order.map(|order| Boot { order }),
        alias: Alias::user(&disk.name),
    })
}

/// Host path, image format and read-only flag of a volume.
fn disk_source(
    vmi: &VirtualMachineInstance,
    volume: &vmi::Volume,
) -> Result<(String, &'static str, bool), ConversionError> {
    let name = &volume.name;
    if volume.container_disk.is_some() {
        Ok((format!("{CONTAINER_DISK_DIR}/{name}/disk.qcow2"), "qcow2", false))
    } else if let Some(pvc) = &volume.persistent_volume_claim {
        Ok((format!("{PVC_DISK_DIR}/{name}/disk.img"), "raw", pvc.read_only))
    } else if volume.data_volume.is_some() {
        Ok((format!("{PVC_DISK_DIR}/{name}/disk.img"), "raw", false))
    } else if let Some(host) = &volume.host_disk {
        Ok((host.path.clone(), "raw", false))
    } else if volume.empty_disk.is_some() {
        Ok((format!("{EMPTY_DISK_DIR}/{name}.qcow2"), "qcow2", false))
    } else if volume.cloud_init_no_cloud.is_some() {
        let namespace = if vmi.metadata.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            vmi.metadata.namespace.as_str()
        };
        Ok((
            format!(
                "{CLOUD_INIT_DIR}/{namespace}/{}/noCloud.iso",
                vmi.metadata.name
            ),
            "raw",
            false,
        ))
    } else {
        Err(ConversionError::UnsupportedVolume(name.clone()))
    }
}

fn guest_memory(domain: &vmi::DomainSpec) -> Result<u64, ConversionError> {
    domain
        .memory
        .as_ref()
        .and_then(|m| m.guest.as_ref())
        .or_else(|| domain.resources.requests.get(RESOURCE_MEMORY))
        .or_else(|| domain.resources.limits.get(RESOURCE_MEMORY))
        .map(|q| q.bytes())
        .ok_or(ConversionError::MissingMemory)
}

/// Explicit socket/core/thread counts, with unset counts taken as 1. When
/// none is set the CPU limit (or request) becomes the core count.
fn cpu_topology(domain: &vmi::DomainSpec) -> CpuTopology {
    let (sockets, cores, threads) = domain
        .cpu
        .as_ref()
        .map_or((0, 0, 0), |c| (c.sockets, c.cores, c.threads));

    if sockets == 0 && cores == 0 && threads == 0 {
        let resources = &domain.resources;
        let cores = resources
            .limits
            .get(RESOURCE_CPU)
            .or_else(|| resources.requests.get(RESOURCE_CPU))
            .and_then(|q| u32::try_from(q.value()).ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        return CpuTopology { sockets: 1, cores, threads: 1 };
    }

    CpuTopology {
        sockets: sockets.max(1),
        cores: cores.max(1),
        threads: threads.max(1),
    }
}

fn cpu(cpu: Option<&vmi::Cpu>, topology: CpuTopology) -> Cpu {
    let model = cpu.map(|c| c.model.as_str()).unwrap_or_default();
    let (mode, model) = match model {
        "" | "host-model" => ("host-model", None),
        "host-passthrough" => ("host-passthrough", None),
        custom => ("custom", Some(custom.to_owned())),
    };
    Cpu { mode: mode.to_owned(), model, topology }
}

fn clock(clock: Option<&vmi::Clock>) -> Clock {
    match clock {
        Some(vmi::Clock { timezone: Some(tz), .. }) => Clock {
            offset: "timezone".to_owned(),
            timezone: Some(tz.clone()),
            adjustment: None,
        },
        Some(vmi::Clock { utc: Some(utc), .. }) => Clock {
            offset: "utc".to_owned(),
            timezone: None,
            adjustment: utc.offset_seconds,
        },
        _ => Clock { offset: "utc".to_owned(), timezone: None, adjustment: None },
    }
}

fn features(features: Option<&vmi::Features>, secure_boot: bool) -> Features {
    let enabled = |state: Option<&vmi::FeatureState>| {
        state.map_or(false, vmi::FeatureState::is_enabled)
    };
    let acpi = features
        .map_or(true, |f| f.acpi.as_ref().map_or(true, |s| s.is_enabled()));
    let apic = features.map_or(false, |f| enabled(f.apic.as_ref()));
    let smm = secure_boot || features.map_or(false, |f| enabled(f.smm.as_ref()));

    Features {
        acpi: acpi.then_some(Empty {}),
        apic: apic.then_some(Empty {}),
        smm: smm.then_some(Empty {}),
    }
}

fn iothreads(domain: &vmi::DomainSpec) -> Option<u32> {
    let disks = &domain.devices.disks;
    let dedicated = disks
        .iter()
        .filter(|d| d.dedicated_io_thread == Some(true))
        .count() as u32;

    match domain.io_threads_policy {
        Some(IoThreadsPolicy::Auto) => Some((disks.len() as u32).max(1)),
        Some(IoThreadsPolicy::Shared) => Some(1 + dedicated),
        None if dedicated > 0 => Some(1 + dedicated),
        None => None,
    }
}

fn virtio_model(transitional: bool) -> String {
    if transitional {
        "virtio-transitional".to_owned()
    } else {
        "virtio-non-transitional".to_owned()
    }
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_owned()
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() { default } else { value }.to_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::EfiConfiguration;
    use crate::cpuset::CpuSet;
    use std::str::FromStr;

    fn logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn instance(raw: &str) -> VirtualMachineInstance {
        serde_yaml::from_str(raw).unwrap()
    }

    fn ctx(cpus: &str) -> ConversionContext {
        ConversionContext::new(
            CpuSet::from_str(cpus).unwrap(),
            EfiConfiguration::default(),
        )
    }

    const BASIC: &str = r#"
metadata:
  name: testvmi
spec:
  domain:
    cpu:
      cores: 2
    memory:
      guest: 1Gi
    devices:
      disks:
        - name: rootdisk
        - name: cdrom
          cdrom: {}
        - name: data
          disk:
            bus: sata
  volumes:
    - name: rootdisk
      containerDisk:
        image: fedora
    - name: cdrom
      hostDisk:
        path: /images/install.iso
    - name: data
      persistentVolumeClaim:
        claimName: data
"#;

    #[test]
    fn device_names_count_like_linux() {
        assert_eq!(device_name("vd", 0), "vda");
        assert_eq!(device_name("vd", 25), "vdz");
        assert_eq!(device_name("vd", 26), "vdaa");
        assert_eq!(device_name("sd", 27), "sdab");
        assert_eq!(device_name("sd", 26 * 27), "sdaaa");
    }

    #[test]
    fn basic_instance() {
        let conv = LibvirtConverter::new(Arch::X86_64, logger());
        let domain = conv.convert(&instance(BASIC), &ctx("")).unwrap();

        assert_eq!(domain.vmi_namespace, "default");
        assert_eq!(domain.spec.name, "default_testvmi");
        assert_eq!(domain.spec.memory, Memory::bytes(1 << 30));
        assert_eq!(domain.spec.os.os_type.machine, "q35");
        assert_eq!(domain.spec.vcpu.count, 2);
        assert!(domain.spec.cputune.is_none());
        assert!(domain.spec.numatune.is_none());

        let disks = &domain.spec.devices.disks;
        let targets: Vec<_> =
            disks.iter().map(|d| (d.device.as_str(), d.target.dev.as_str())).collect();
        assert_eq!(targets, [("disk", "vda"), ("cdrom", "sda"), ("disk", "sdb")]);
        assert!(disks[1].readonly.is_some());
        assert_eq!(disks[0].driver.driver_type, "qcow2");
        assert_eq!(disks[2].source.file, "/var/run/kubevirt-private/vmi-disks/data/disk.img");

        assert!(domain.spec.devices.serial.is_some());
        assert_eq!(domain.spec.devices.memballoon.model, "virtio-non-transitional");
        assert!(domain.spec.features.acpi.is_some());
    }

    #[test]
    fn pins_vcpus_to_cell() {
        let conv = LibvirtConverter::new(Arch::X86_64, logger());
        let domain = conv.convert(&instance(BASIC), &ctx("4,6")).unwrap();

        let cputune = domain.spec.cputune.unwrap();
        let pins: Vec<_> =
            cputune.vcpu_pins.iter().map(|p| (p.vcpu, p.cpuset.as_str())).collect();
        assert_eq!(pins, [(0, "4"), (1, "6")]);
        assert!(cputune.emulator_pin.is_none());
        assert_eq!(domain.spec.numatune.unwrap().memory.nodeset, "0");
    }

    #[test]
    fn too_few_cpus_to_pin() {
        let conv = LibvirtConverter::new(Arch::X86_64, logger());
        assert_eq!(
            conv.convert(&instance(BASIC), &ctx("0")),
            Err(ConversionError::NotEnoughCpus { needed: 2, available: 1 })
        );
    }

    #[test]
    fn missing_pieces() {
        let conv = LibvirtConverter::new(Arch::X86_64, logger());

        let mut vmi = instance(BASIC);
        vmi.metadata.name.clear();
        assert_eq!(conv.convert(&vmi, &ctx("")), Err(ConversionError::MissingName));

        let mut vmi = instance(BASIC);
        vmi.spec.domain.memory = None;
        assert_eq!(conv.convert(&vmi, &ctx("")), Err(ConversionError::MissingMemory));

        let mut vmi = instance(BASIC);
        vmi.spec.volumes.pop();
        assert_eq!(
            conv.convert(&vmi, &ctx("")),
            Err(ConversionError::MissingVolume("data".to_owned()))
        );

        let mut vmi = instance(BASIC);
        vmi.spec.volumes[0].container_disk = None;
        assert_eq!(
            conv.convert(&vmi, &ctx("")),
            Err(ConversionError::UnsupportedVolume("rootdisk".to_owned()))
        );
    }

    #[test]
    fn vcpus_fall_back_to_cpu_resources() {
        let vmi = instance(
            r#"
metadata:
  name: small
spec:
  domain:
    resources:
      requests:
        cpu: 1500m
        memory: 64Mi
"#,
        );
        let conv = LibvirtConverter::new(Arch::Aarch64, logger());
        let domain = conv.convert(&vmi, &ctx("")).unwrap();
        assert_eq!(domain.spec.cpu.topology, CpuTopology { sockets: 1, cores: 2, threads: 1 });
        assert_eq!(domain.spec.memory.value, 64 << 20);
        assert_eq!(domain.spec.os.os_type.machine, "virt");
        assert_eq!(domain.spec.os.os_type.arch, "aarch64");
    }

    #[test]
    fn efi_secure_boot_enables_smm() {
        let vmi = instance(
            r#"
metadata:
  name: efi
  namespace: prod
spec:
  domain:
    memory:
      guest: 1Gi
    firmware:
      bootloader:
        efi: {}
"#,
        );
        let efi = EfiConfiguration {
            code: Some("/usr/share/OVMF/OVMF_CODE.secboot.fd".into()),
            vars: Some("/usr/share/OVMF/OVMF_VARS.secboot.fd".into()),
        };
        let ctx = ConversionContext::new(CpuSet::new(), efi);
        let conv = LibvirtConverter::new(Arch::X86_64, logger());
        let domain = conv.convert(&vmi, &ctx).unwrap();

        let loader = domain.spec.os.loader.unwrap();
        assert_eq!(loader.secure, "yes");
        assert_eq!(loader.path.as_deref(), Some("/usr/share/OVMF/OVMF_CODE.secboot.fd"));
        let nvram = domain.spec.os.nvram.unwrap();
        assert_eq!(nvram.path, "/var/lib/libvirt/qemu/nvram/prod_efi_VARS.fd");
        assert!(domain.spec.features.smm.is_some());
    }

    #[test]
    fn rejects_oversized_topology() {
        let mut vmi = instance(BASIC);
        let cpu = vmi.spec.domain.cpu.get_or_insert_with(Default::default);
        cpu.sockets = 65536;
        cpu.cores = 65536;
        let conv = LibvirtConverter::new(Arch::X86_64, logger());
        assert_eq!(
            conv.convert(&vmi, &ctx("")),
            Err(ConversionError::TooManyVcpus {
                sockets: 65536,
                cores: 65536,
                threads: 1,
            })
        );

        assert_eq!(
            CpuTopology { sockets: 2, cores: 4, threads: 2 }.vcpus(),
            Some(16)
        );
        assert_eq!(
            CpuTopology { sockets: u32::MAX, cores: 1, threads: 2 }.vcpus(),
            None
        );
    }

    #[test]
    fn rejects_unsupported_devices() {
        let mut vmi = instance(BASIC);
        vmi.spec.domain.devices.gpus.push(vmi::Gpu {
            name: "gpu1".to_owned(),
            device_name: "nvidia.com/GP102GL".to_owned(),
        });
        let conv = LibvirtConverter::new(Arch::X86_64, logger());
        assert_eq!(
            conv.convert(&vmi, &ctx("")),
            Err(ConversionError::Unsupported("GPUs"))
        );
    }

    #[test]
    fn arch_names() {
        assert_eq!(Arch::from_str("s390x").unwrap(), Arch::S390x);
        assert_eq!(Arch::X86_64.to_string(), "x86_64");
        assert!(Arch::from_str("riscv64").is_err());
    }
}
