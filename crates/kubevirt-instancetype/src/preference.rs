// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Preference defaults. A preference only fills what the instance leaves
//! unset; an explicit value always wins.

use kubevirt_api_types::instancetype::{
    DevicePreferences, FeaturePreferences, FirmwarePreferences,
    PreferenceSpec,
};
use kubevirt_api_types::vmi::{
    Bios, Bootloader, Clock, DiskBus, DiskTarget, Efi, Features, Firmware,
    Machine, VirtualMachineInstance, VirtualMachineInstanceSpec,
};

/// Fills unset fields of `vmi` from `preference`.
pub fn apply_preferences(
    preference: &PreferenceSpec,
    vmi: &mut VirtualMachineInstance,
) {
    let spec = &mut vmi.spec;
    if let Some(devices) = &preference.devices {
        apply_device_preferences(devices, spec);
    }
    if let Some(features) = &preference.features {
        apply_feature_preferences(features, spec);
    }
    if let Some(firmware) = &preference.firmware {
        apply_firmware_preferences(firmware, spec);
    }

    let domain = &mut spec.domain;
    if let Some(machine_type) = preference
        .machine
        .as_ref()
        .and_then(|m| m.preferred_machine_type.as_ref())
    {
        let machine = domain.machine.get_or_insert_with(Machine::default);
        if machine.machine_type.is_empty() {
            machine.machine_type = machine_type.clone();
        }
    }

    if domain.clock.is_none() {
        if let Some(offset) = preference
            .clock
            .as_ref()
            .and_then(|c| c.preferred_clock_offset.as_ref())
        {
            domain.clock = Some(Clock {
                utc: offset.utc.clone(),
                timezone: offset.timezone.clone(),
            });
        }
    }

    fill(&mut spec.subdomain, &preference.preferred_subdomain);
    fill(
        &mut spec.termination_grace_period_seconds,
        &preference.preferred_termination_grace_period_seconds,
    );

    for (key, value) in &preference.annotations {
        vmi.metadata
            .annotations
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

fn fill<T: Clone>(field: &mut Option<T>, preferred: &Option<T>) {
    if field.is_none() {
        field.clone_from(preferred);
    }
}

fn fill_str(field: &mut String, preferred: &Option<String>) {
    if let Some(preferred) = preferred.as_ref().filter(|_| field.is_empty()) {
        *field = preferred.clone();
    }
}

fn apply_device_preferences(
    prefs: &DevicePreferences,
    spec: &mut VirtualMachineInstanceSpec,
) {
    let devices = &mut spec.domain.devices;

    fill(
        &mut devices.autoattach_graphics_device,
        &prefs.preferred_autoattach_graphics_device,
    );
    fill(
        &mut devices.autoattach_mem_balloon,
        &prefs.preferred_autoattach_mem_balloon,
    );
    fill(
        &mut devices.autoattach_pod_interface,
        &prefs.preferred_autoattach_pod_interface,
    );
    fill(
        &mut devices.autoattach_serial_console,
        &prefs.preferred_autoattach_serial_console,
    );
    fill(
        &mut devices.autoattach_input_device,
        &prefs.preferred_autoattach_input_device,
    );
    fill(
        &mut devices.use_virtio_transitional,
        &prefs.preferred_use_virtio_transitional,
    );
    fill(&mut devices.block_multi_queue, &prefs.preferred_block_multi_queue);
    fill(
        &mut devices.network_interface_multiqueue,
        &prefs.preferred_network_interface_multi_queue,
    );
    fill(&mut devices.rng, &prefs.preferred_rng);
    fill(&mut devices.tpm, &prefs.preferred_tpm);

    for disk in &mut devices.disks {
        if disk.disk.is_none() && disk.cdrom.is_none() && disk.lun.is_none() {
            disk.disk = Some(DiskTarget::default());
        }

        if let Some(target) = &mut disk.disk {
            fill(&mut target.bus, &prefs.preferred_disk_bus);
            fill(&mut disk.cache, &prefs.preferred_disk_cache);
            fill(&mut disk.io, &prefs.preferred_disk_io);
            if target.bus == Some(DiskBus::Virtio) {
                fill(
                    &mut disk.dedicated_io_thread,
                    &prefs.preferred_disk_dedicated_io_thread,
                );
            }
        } else if let Some(target) = &mut disk.cdrom {
            fill(&mut target.bus, &prefs.preferred_cdrom_bus);
        } else if let Some(target) = &mut disk.lun {
            fill(&mut target.bus, &prefs.preferred_lun_bus);
        }
    }

    for iface in &mut devices.interfaces {
        fill(&mut iface.model, &prefs.preferred_interface_model);
        if !iface.has_binding() {
            fill(&mut iface.masquerade, &prefs.preferred_interface_masquerade);
        }
    }

    for input in &mut devices.inputs {
        fill_str(&mut input.bus, &prefs.preferred_input_bus);
        fill_str(&mut input.input_type, &prefs.preferred_input_type);
    }

    if let Some(sound) = &mut devices.sound {
        fill(&mut sound.model, &prefs.preferred_sound_model);
    }
}

fn apply_feature_preferences(
    prefs: &FeaturePreferences,
    spec: &mut VirtualMachineInstanceSpec,
) {
    let any = prefs.preferred_acpi.is_some()
        || prefs.preferred_apic.is_some()
        || prefs.preferred_smm.is_some();
    if !any {
        return;
    }

    let features = spec.domain.features.get_or_insert_with(Features::default);
    fill(&mut features.acpi, &prefs.preferred_acpi);
    fill(&mut features.apic, &prefs.preferred_apic);
    fill(&mut features.smm, &prefs.preferred_smm);
}

/// BIOS and EFI are exclusive: a preferred bootloader is only added when
/// the instance names neither.
fn apply_firmware_preferences(
    prefs: &FirmwarePreferences,
    spec: &mut VirtualMachineInstanceSpec,
) {
    let domain = &mut spec.domain;
    let has_bootloader = domain
        .firmware
        .as_ref()
        .and_then(|f| f.bootloader.as_ref())
        .map_or(false, |b| b.bios.is_some() || b.efi.is_some());

    if !has_bootloader {
        let bootloader = if prefs.preferred_use_bios == Some(true) {
            Some(Bootloader { bios: Some(Bios::default()), efi: None })
        } else if prefs.preferred_use_efi == Some(true) {
            Some(Bootloader { bios: None, efi: Some(Efi::default()) })
        } else {
            None
        };
        if let Some(bootloader) = bootloader {
            domain
                .firmware
                .get_or_insert_with(Firmware::default)
                .bootloader = Some(bootloader);
        }
    }

    let Some(bootloader) =
        domain.firmware.as_mut().and_then(|f| f.bootloader.as_mut())
    else {
        return;
    };
    if let Some(bios) = &mut bootloader.bios {
        fill(&mut bios.use_serial, &prefs.preferred_use_bios_serial);
    }
    if let Some(efi) = &mut bootloader.efi {
        fill(&mut efi.secure_boot, &prefs.preferred_use_secure_boot);
    }
}
