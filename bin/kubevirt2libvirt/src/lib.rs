// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion of a KubeVirt VirtualMachine (or VirtualMachineInstance)
//! document into libvirt domain XML.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use kubevirt2libvirt_config::Config;
use kubevirt_instancetype::{
    decode_objects, decode_root, InstancetypeRegistry, ObjectKind,
    PreferenceRegistry, Resolver, RootSpec,
};
use libvirt_domain::{
    to_xml, Arch, Converter, CpuSet, EfiConfiguration, LibvirtConverter,
};
use slog::{info, o, Logger};

/// Everything a conversion needs besides the input document.
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub preferences: Vec<PathBuf>,
    pub instancetypes: Vec<PathBuf>,
    pub cpu_set: CpuSet,
    pub arch: Arch,
    pub emulator: Option<String>,
    pub efi: EfiConfiguration,
}

impl From<Config> for Options {
    fn from(config: Config) -> Self {
        Self {
            preferences: config.overlays.preferences,
            instancetypes: config.overlays.instancetypes,
            cpu_set: config.host.cpuset.unwrap_or_default(),
            arch: config.host.arch.unwrap_or_default(),
            emulator: config.host.emulator,
            efi: config.efi.into(),
        }
    }
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Builds the overlay registries from every configured overlay file.
pub fn load_overlays(
    options: &Options,
    log: &Logger,
) -> anyhow::Result<(PreferenceRegistry, InstancetypeRegistry)> {
    let mut preferences = PreferenceRegistry::new();
    for path in &options.preferences {
        let objects =
            decode_objects(open(path)?, ObjectKind::PREFERENCES, log)
                .with_context(|| {
                    format!("failed to load preferences from {}", path.display())
                })?;
        preferences.extend_from_objects(objects, log);
    }

    let mut instancetypes = InstancetypeRegistry::new();
    for path in &options.instancetypes {
        let objects =
            decode_objects(open(path)?, ObjectKind::INSTANCETYPES, log)
                .with_context(|| {
                    format!(
                        "failed to load instance types from {}",
                        path.display()
                    )
                })?;
        instancetypes.extend_from_objects(objects, log);
    }

    info!(log, "loaded overlays";
        "preferences" => preferences.len(),
        "instancetypes" => instancetypes.len());
    Ok((preferences, instancetypes))
}

/// Converts the document read from `input` into domain XML terminated by a
/// newline.
pub fn convert<R: Read>(
    input: R,
    options: &Options,
    log: &Logger,
) -> anyhow::Result<String> {
    let (preferences, instancetypes) = load_overlays(options, log)?;

    let object = decode_root(input, log).context("failed to decode input")?;
    let root = RootSpec::from_object(object).ok_or_else(|| {
        anyhow!("input is not a VirtualMachine or VirtualMachineInstance")
    })?;

    let resolved = Resolver::new(
        &preferences,
        &instancetypes,
        log.new(o!("component" => "resolver")),
    )
    .with_efi(options.efi.clone())
    .resolve(root, options.cpu_set.clone())?;

    let mut converter = LibvirtConverter::new(
        options.arch,
        log.new(o!("component" => "converter")),
    );
    if let Some(emulator) = &options.emulator {
        converter = converter.with_emulator(emulator.clone());
    }
    let domain = converter.convert(&resolved.instance, &resolved.context)?;
    info!(log, "converted instance";
        "namespace" => &domain.vmi_namespace,
        "name" => &domain.vmi_name);

    let mut xml = to_xml(&domain.spec)?;
    xml.push('\n');
    Ok(xml)
}
