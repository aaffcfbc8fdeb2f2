// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Golden tests: every `testdata/<case>.in` converts to `<case>.out`.
//!
//! Run with `EXPECTORATE=overwrite` to regenerate the expected output.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use kubevirt2libvirt::{convert, Options};
use libvirt_domain::CpuSet;

/// Each case and the host CPUs it is converted for.
const CASES: &[(&str, &str)] =
    &[("vmi-pinned", "0,1"), ("vm-fedora", ""), ("vm-windows", "0-3")];

fn testdata() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("testdata")
}

fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn options(cpus: &str) -> Options {
    let dir = testdata();
    Options {
        preferences: vec![dir.join("preferences.yaml")],
        instancetypes: vec![dir.join("instancetypes.yaml")],
        cpu_set: CpuSet::from_str(cpus).unwrap(),
        ..Default::default()
    }
}

#[test]
fn golden_outputs() {
    for (case, cpus) in CASES {
        let input = std::fs::read(testdata().join(format!("{case}.in")))
            .unwrap_or_else(|e| panic!("reading {case}.in: {e}"));
        let xml = convert(input.as_slice(), &options(cpus), &logger())
            .unwrap_or_else(|e| panic!("converting {case}: {e:?}"));
        expectorate::assert_contents(
            testdata().join(format!("{case}.out")),
            &xml,
        );
    }
}

#[test]
fn every_input_has_a_case() {
    let mut inputs: Vec<String> = std::fs::read_dir(testdata())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "in"))
        .map(|path| path.file_stem().unwrap().to_string_lossy().into_owned())
        .collect();
    inputs.sort();

    let mut cases: Vec<String> =
        CASES.iter().map(|(case, _)| case.to_string()).collect();
    cases.sort();
    assert_eq!(inputs, cases);
}

#[test]
fn conversion_is_deterministic() {
    let input = std::fs::read(testdata().join("vm-windows.in")).unwrap();
    let first = convert(input.as_slice(), &options("0-3"), &logger()).unwrap();
    let second = convert(input.as_slice(), &options("0-3"), &logger()).unwrap();
    assert_eq!(first, second);
    assert!(first.ends_with("</domain>\n"));
}

#[test]
fn emulator_and_arch_are_applied() {
    let input = std::fs::read(testdata().join("vm-fedora.in")).unwrap();
    let options = Options {
        arch: libvirt_domain::Arch::Aarch64,
        emulator: Some("/usr/bin/qemu-system-aarch64".to_owned()),
        ..options("")
    };
    let xml = convert(input.as_slice(), &options, &logger()).unwrap();
    assert!(xml.contains(
        "    <emulator>/usr/bin/qemu-system-aarch64</emulator>\n"
    ));
    // The preference pins the machine type even on aarch64.
    assert!(xml.contains(
        "    <type arch=\"aarch64\" machine=\"q35\">hvm</type>\n"
    ));
    assert!(xml.contains("<model type=\"virtio\" heads=\"1\" vram=\"16384\"/>"));
}

#[test]
fn unknown_overlays_are_reported_by_name() {
    let input = r#"
apiVersion: kubevirt.io/v1
kind: VirtualMachine
metadata:
  name: vm
spec:
  instancetype:
    name: small
"#;
    let err = convert(input.as_bytes(), &options(""), &logger()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknown VirtualMachineClusterInstancetype \"small\""
    );
}

#[test]
fn missing_overlay_file_is_named() {
    let options = Options {
        preferences: vec![testdata().join("nonexistent.yaml")],
        ..Default::default()
    };
    let err = convert(&b""[..], &options, &logger()).unwrap_err();
    assert!(format!("{err:#}").contains("nonexistent.yaml"));
}

#[test]
fn overlay_files_reject_root_documents() {
    let options = Options {
        preferences: vec![testdata().join("vm-fedora.in")],
        ..Default::default()
    };
    let err = convert(&b""[..], &options, &logger()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to load preferences"));
}
