// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use libvirt_domain::{Arch, CpuSet, EfiConfiguration};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the converter. Every section is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub overlays: Overlays,

    #[serde(default)]
    pub host: Host,

    #[serde(default)]
    pub efi: Efi,
}

/// Files holding instance types and preferences to load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Overlays {
    #[serde(default)]
    pub preferences: Vec<PathBuf>,

    #[serde(default)]
    pub instancetypes: Vec<PathBuf>,
}

/// Facts about the host the domain will run on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Host {
    /// CPUs guest vCPUs are pinned to, in list format (`0,2-4`).
    pub cpuset: Option<CpuSet>,

    pub arch: Option<Arch>,

    /// Path of the QEMU binary recorded in the domain.
    pub emulator: Option<String>,
}

/// Firmware images for guests booting with EFI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Efi {
    pub code: Option<PathBuf>,
    pub vars: Option<PathBuf>,
}

impl From<Efi> for EfiConfiguration {
    fn from(efi: Efi) -> Self {
        EfiConfiguration { code: efi.code, vars: efi.vars }
    }
}

/// Errors which may be returned when parsing the configuration.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Cannot parse toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Config {
    /// Makes every relative path in the configuration relative to `base`.
    pub fn rebase(&mut self, base: &Path) {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        self.overlays.preferences.iter_mut().for_each(rebase);
        self.overlays.instancetypes.iter_mut().for_each(rebase);
        self.efi.code.iter_mut().for_each(rebase);
        self.efi.vars.iter_mut().for_each(rebase);
    }
}

/// Parses a TOML file into a configuration object. Relative paths in the
/// file are taken relative to the directory holding it.
pub fn parse<P: AsRef<Path>>(path: P) -> Result<Config, ParseError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let mut cfg = toml::from_str::<Config>(&contents)?;
    if let Some(dir) = path.parent() {
        cfg.rebase(dir);
    }
    Ok(cfg)
}
