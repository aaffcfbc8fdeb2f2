// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn testdata(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testdata")
        .join(file)
}

/// Runs the binary with `args`, feeding `stdin` to it.
fn run(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_kubevirt2libvirt"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    // The child may exit before reading its input.
    let _ = child.stdin.take().unwrap().write_all(stdin.as_bytes());
    child.wait_with_output().unwrap()
}

fn overlay_args() -> Vec<String> {
    vec![
        "--preferences".to_owned(),
        testdata("preferences.yaml").display().to_string(),
        "--instancetypes".to_owned(),
        testdata("instancetypes.yaml").display().to_string(),
    ]
}

const BARE_VMI: &str = r#"
apiVersion: kubevirt.io/v1
kind: VirtualMachineInstance
metadata:
  name: pinned
spec:
  domain:
    cpu:
      cores: 2
    memory:
      guest: 512Mi
"#;

#[test]
fn pins_bare_instance_to_cpuset() {
    let out = run(&["--cpuset", "0,1"], BARE_VMI);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("    <vcpupin vcpu=\"0\" cpuset=\"0\"/>\n"));
    assert!(stdout.contains("    <vcpupin vcpu=\"1\" cpuset=\"1\"/>\n"));
    assert!(stdout.contains("    <memory mode=\"strict\" nodeset=\"0\"/>\n"));
    assert!(stdout.ends_with("</domain>\n"));
}

#[test]
fn reads_input_from_file() {
    let mut args = overlay_args();
    args.push(testdata("vm-fedora.in").display().to_string());
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let out = run(&args, "");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let expected = std::fs::read_to_string(testdata("vm-fedora.out")).unwrap();
    assert_eq!(String::from_utf8(out.stdout).unwrap(), expected);
}

#[test]
fn unknown_instancetype_fails() {
    let vm = r#"
apiVersion: kubevirt.io/v1
kind: VirtualMachine
metadata:
  name: vm
spec:
  instancetype:
    name: small
  template:
    spec:
      domain:
        devices: {}
"#;
    let args = overlay_args();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let out = run(&args, vm);

    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("\"small\""), "{stderr}");
}

#[test]
fn conflicting_memory_fails() {
    let vm = r#"
apiVersion: kubevirt.io/v1
kind: VirtualMachine
metadata:
  name: vm
spec:
  instancetype:
    name: u1.small
  template:
    spec:
      domain:
        memory:
          guest: 4Gi
        devices: {}
"#;
    let args = overlay_args();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let out = run(&args, vm);

    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("spec.template.spec.domain.memory.guest"), "{stderr}");
}

#[test]
fn config_file_supplies_overlays_and_host() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(
        testdata("instancetypes.yaml"),
        dir.path().join("instancetypes.yaml"),
    )
    .unwrap();
    let config = dir.path().join("kubevirt2libvirt.toml");
    std::fs::write(
        &config,
        "[overlays]\ninstancetypes = [\"instancetypes.yaml\"]\n\n\
         [host]\ncpuset = \"4-7\"\nemulator = \"/usr/libexec/qemu-kvm\"\n",
    )
    .unwrap();

    let vm = r#"
apiVersion: kubevirt.io/v1
kind: VirtualMachine
metadata:
  name: vm
spec:
  instancetype:
    name: u1.small
  template:
    spec:
      domain:
        devices: {}
"#;
    let config = config.display().to_string();
    let out = run(&["--config", &config], vm);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("<emulator>/usr/libexec/qemu-kvm</emulator>"));
    assert!(stdout.contains("<vcpupin vcpu=\"1\" cpuset=\"5\"/>"));

    // The command line overrides the configured host CPUs.
    let out = run(&["--config", &config, "--cpuset", "2-3"], vm);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("<vcpupin vcpu=\"1\" cpuset=\"3\"/>"));
}

#[test]
fn rejects_bad_cpuset() {
    let out = run(&["--cpuset", "3-1"], BARE_VMI);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn rejects_multiple_roots() {
    let input = format!("{BARE_VMI}---{BARE_VMI}");
    let out = run(&[], &input);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}
