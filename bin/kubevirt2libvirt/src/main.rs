// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kubevirt2libvirt::Options;
use kubevirt2libvirt_config::Config;
use libvirt_domain::{Arch, CpuSet};
use slog::{debug, o, Drain};

#[derive(Debug, Parser)]
#[clap(about, version)]
/// Resolve a KubeVirt VirtualMachine against its instance type and
/// preference and print the resulting libvirt domain XML.
struct Opt {
    /// VirtualMachine or VirtualMachineInstance document. Reads standard
    /// input when absent or `-`.
    #[clap(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// YAML file of preferences; may be repeated.
    #[clap(long, value_name = "FILE")]
    preferences: Vec<PathBuf>,

    /// YAML file of instance types; may be repeated.
    #[clap(long, value_name = "FILE")]
    instancetypes: Vec<PathBuf>,

    /// Host CPUs to pin guest vCPUs to, e.g. `0,2-4`.
    #[clap(long, value_name = "LIST")]
    cpuset: Option<CpuSet>,

    /// Guest architecture (x86_64, aarch64 or s390x).
    #[clap(long)]
    arch: Option<Arch>,

    /// TOML configuration file.
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[clap(long, default_value_t = slog::Level::Warning, value_parser = parse_log_level)]
    log_level: slog::Level,
}

fn parse_log_level(s: &str) -> anyhow::Result<slog::Level> {
    s.parse().map_err(|_| anyhow::anyhow!("Invalid log level"))
}

fn build_log(level: slog::Level) -> (slog::Logger, slog_async::AsyncGuard) {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let (drain, guard) = slog_async::Async::new(drain).build_with_guard();
    (slog::Logger::root(drain.fuse(), o!()), guard)
}

impl Opt {
    /// Layers the command line over the configuration file: overlay files
    /// from both are loaded, and host settings given here take precedence.
    fn options(&self) -> anyhow::Result<Options> {
        let config = match &self.config {
            Some(path) => kubevirt2libvirt_config::parse(path).with_context(
                || format!("failed to read config {}", path.display()),
            )?,
            None => Config::default(),
        };

        let mut options = Options::from(config);
        options.preferences.extend(self.preferences.iter().cloned());
        options.instancetypes.extend(self.instancetypes.iter().cloned());
        if let Some(cpuset) = &self.cpuset {
            options.cpu_set = cpuset.clone();
        }
        if let Some(arch) = self.arch {
            options.arch = arch;
        }
        Ok(options)
    }

    fn input(&self) -> anyhow::Result<Box<dyn Read>> {
        match &self.input {
            Some(path) if path.as_os_str() != "-" => {
                let file = File::open(path).with_context(|| {
                    format!("failed to open {}", path.display())
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
            _ => Ok(Box::new(io::stdin().lock())),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    let (log, _guard) = build_log(opt.log_level);

    let options = opt.options()?;
    debug!(log, "starting";
        "preferences" => options.preferences.len(),
        "instancetypes" => options.instancetypes.len(),
        "arch" => %options.arch,
        "cpuset" => %options.cpu_set);

    let xml = kubevirt2libvirt::convert(opt.input()?, &options, &log)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(xml.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
