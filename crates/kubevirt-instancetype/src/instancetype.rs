// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application of an instance type onto an instance.
//!
//! Every field an instance type asserts is authoritative. If the instance
//! already sets one of them the whole application fails, naming every
//! such field at once; nothing is applied in that case.

use kubevirt_api_types::instancetype::{
    InstancetypeSpec, PreferenceSpec, PreferredCpuTopology, SpreadAcross,
};
use kubevirt_api_types::vmi::{
    Cpu, Memory, VirtualMachineInstance, RESOURCE_CPU, RESOURCE_MEMORY,
};
use kubevirt_api_types::Quantity;

use crate::field::{Conflicts, FieldPath};
use crate::resolve::ResolutionError;

const DEFAULT_SPREAD_RATIO: u32 = 2;
const THREADS_PER_CORE: u32 = 2;

/// Socket, core and thread counts for a vCPU count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuestTopology {
    pub sockets: u32,
    pub cores: u32,
    pub threads: u32,
}

/// Lays out `vcpus` according to the preference's topology choice.
pub fn guest_topology(
    vcpus: u32,
    preference: Option<&PreferenceSpec>,
) -> Result<GuestTopology, ResolutionError> {
    if vcpus == 0 {
        return Err(ResolutionError::NoGuestCpus);
    }

    let cpu = preference.and_then(|p| p.cpu.as_ref());
    let preferred =
        cpu.and_then(|c| c.preferred_cpu_topology).unwrap_or_default();

    let topology = |sockets, cores, threads| GuestTopology {
        sockets,
        cores,
        threads,
    };
    match preferred {
        PreferredCpuTopology::Sockets | PreferredCpuTopology::Any => {
            Ok(topology(vcpus, 1, 1))
        }
        PreferredCpuTopology::Cores => Ok(topology(1, vcpus, 1)),
        PreferredCpuTopology::Threads => Ok(topology(1, 1, vcpus)),
        PreferredCpuTopology::Spread => {
            let options = cpu.and_then(|c| c.spread_options.as_ref());
            let ratio = options
                .and_then(|o| o.ratio)
                .unwrap_or(DEFAULT_SPREAD_RATIO);
            let across = options.and_then(|o| o.across).unwrap_or_default();

            let divisor = match across {
                SpreadAcross::SocketsCores | SpreadAcross::CoresThreads => {
                    ratio
                }
                SpreadAcross::SocketsCoresThreads => {
                    ratio.saturating_mul(THREADS_PER_CORE)
                }
            };
            if divisor == 0 || vcpus % divisor != 0 {
                return Err(ResolutionError::UnsatisfiableTopology {
                    vcpus,
                    ratio,
                    across,
                });
            }

            Ok(match across {
                SpreadAcross::SocketsCores => topology(vcpus / ratio, ratio, 1),
                SpreadAcross::CoresThreads => topology(1, vcpus / ratio, ratio),
                SpreadAcross::SocketsCoresThreads => {
                    topology(vcpus / divisor, ratio, THREADS_PER_CORE)
                }
            })
        }
    }
}

/// Returns the paths of every field that both `vmi` and `instancetype`
/// set. `template` is the path of the VirtualMachine's template.
pub fn find_conflicts(
    instancetype: &InstancetypeSpec,
    vmi: &VirtualMachineInstance,
    template: &FieldPath,
) -> Conflicts {
    let spec_path = template.child("spec");
    let domain_path = spec_path.child("domain");
    let spec = &vmi.spec;
    let domain = &spec.domain;
    let resources = &domain.resources;
    let cpu = domain.cpu.clone().unwrap_or_default();
    let memory = domain.memory.clone().unwrap_or_default();
    let it_cpu = &instancetype.cpu;

    let mut conflicts = Conflicts::new();

    // cpu.guest is always asserted.
    conflicts.check(
        resources.requests.contains_key(RESOURCE_CPU),
        domain_path.child("resources.requests.cpu"),
    );
    conflicts.check(
        resources.limits.contains_key(RESOURCE_CPU),
        domain_path.child("resources.limits.cpu"),
    );
    conflicts.check(cpu.sockets != 0, domain_path.child("cpu.sockets"));
    conflicts.check(cpu.cores != 0, domain_path.child("cpu.cores"));
    conflicts.check(cpu.threads != 0, domain_path.child("cpu.threads"));

    conflicts.check(
        it_cpu.model.is_some() && !cpu.model.is_empty(),
        domain_path.child("cpu.model"),
    );
    conflicts.check(
        it_cpu.dedicated_cpu_placement.is_some() && cpu.dedicated_cpu_placement,
        domain_path.child("cpu.dedicatedCpuPlacement"),
    );
    conflicts.check(
        it_cpu.isolate_emulator_thread.is_some() && cpu.isolate_emulator_thread,
        domain_path.child("cpu.isolateEmulatorThread"),
    );
    conflicts.check(
        it_cpu.numa.is_some() && cpu.numa.is_some(),
        domain_path.child("cpu.numa"),
    );
    conflicts.check(
        it_cpu.realtime.is_some() && cpu.realtime.is_some(),
        domain_path.child("cpu.realtime"),
    );

    // memory.guest is always asserted.
    conflicts.check(memory.guest.is_some(), domain_path.child("memory.guest"));
    conflicts.check(
        resources.requests.contains_key(RESOURCE_MEMORY),
        domain_path.child("resources.requests.memory"),
    );
    conflicts.check(
        resources.limits.contains_key(RESOURCE_MEMORY),
        domain_path.child("resources.limits.memory"),
    );
    conflicts.check(
        instancetype.memory.hugepages.is_some() && memory.hugepages.is_some(),
        domain_path.child("memory.hugepages"),
    );

    conflicts.check(
        instancetype.node_selector.is_some() && !spec.node_selector.is_empty(),
        spec_path.child("nodeSelector"),
    );
    conflicts.check(
        instancetype.scheduler_name.is_some() && !spec.scheduler_name.is_empty(),
        spec_path.child("schedulerName"),
    );
    conflicts.check(
        instancetype.io_threads_policy.is_some()
            && domain.io_threads_policy.is_some(),
        domain_path.child("ioThreadsPolicy"),
    );
    conflicts.check(
        instancetype.launch_security.is_some()
            && domain.launch_security.is_some(),
        domain_path.child("launchSecurity"),
    );
    conflicts.check(
        !instancetype.gpus.is_empty() && !domain.devices.gpus.is_empty(),
        domain_path.child("devices.gpus"),
    );
    conflicts.check(
        !instancetype.host_devices.is_empty()
            && !domain.devices.host_devices.is_empty(),
        domain_path.child("devices.hostDevices"),
    );

    let annotations_path = template.child("metadata.annotations");
    for (key, value) in &instancetype.annotations {
        let differs = vmi
            .metadata
            .annotations
            .get(key)
            .map_or(false, |existing| existing != value);
        conflicts.check(differs, annotations_path.child(key));
    }

    conflicts
}

/// Applies `instancetype` onto `vmi`, laying out vCPUs as `preference`
/// asks. Fails without modifying `vmi` when any asserted field is already
/// set.
pub fn apply_instancetype(
    instancetype: &InstancetypeSpec,
    preference: Option<&PreferenceSpec>,
    vmi: &mut VirtualMachineInstance,
    template: &FieldPath,
) -> Result<(), ResolutionError> {
    let conflicts = find_conflicts(instancetype, vmi, template);
    if !conflicts.is_empty() {
        return Err(ResolutionError::OverlayConflict(conflicts));
    }

    let topology = guest_topology(instancetype.cpu.guest, preference)?;
    let it_cpu = &instancetype.cpu;
    let spec = &mut vmi.spec;
    let domain = &mut spec.domain;

    let cpu = domain.cpu.get_or_insert_with(Cpu::default);
    cpu.sockets = topology.sockets;
    cpu.cores = topology.cores;
    cpu.threads = topology.threads;
    if let Some(model) = &it_cpu.model {
        cpu.model = model.clone();
    }
    if let Some(dedicated) = it_cpu.dedicated_cpu_placement {
        cpu.dedicated_cpu_placement = dedicated;
    }
    if let Some(isolate) = it_cpu.isolate_emulator_thread {
        cpu.isolate_emulator_thread = isolate;
    }
    if it_cpu.numa.is_some() {
        cpu.numa = it_cpu.numa.clone();
    }
    if it_cpu.realtime.is_some() {
        cpu.realtime = it_cpu.realtime.clone();
    }

    let it_memory = &instancetype.memory;
    let memory = domain.memory.get_or_insert_with(Memory::default);
    memory.guest = Some(it_memory.guest.clone());
    if it_memory.hugepages.is_some() {
        memory.hugepages = it_memory.hugepages.clone();
    }
    if it_memory.overcommit_percent > 0 {
        let request =
            overcommitted(it_memory.guest.bytes(), it_memory.overcommit_percent);
        domain
            .resources
            .requests
            .insert(RESOURCE_MEMORY.to_owned(), Quantity::from_bytes(request));
    }

    if instancetype.io_threads_policy.is_some() {
        domain.io_threads_policy = instancetype.io_threads_policy;
    }
    if instancetype.launch_security.is_some() {
        domain.launch_security = instancetype.launch_security.clone();
    }
    if !instancetype.gpus.is_empty() {
        domain.devices.gpus = instancetype.gpus.clone();
    }
    if !instancetype.host_devices.is_empty() {
        domain.devices.host_devices = instancetype.host_devices.clone();
    }
    if let Some(selector) = &instancetype.node_selector {
        spec.node_selector = selector.clone();
    }
    if let Some(scheduler) = &instancetype.scheduler_name {
        spec.scheduler_name = scheduler.clone();
    }

    for (key, value) in &instancetype.annotations {
        vmi.metadata.annotations.insert(key.clone(), value.clone());
    }

    Ok(())
}

/// Memory request left after lowering `guest` bytes by `percent`.
fn overcommitted(guest: u64, percent: u8) -> u64 {
    let kept = u128::from(100u8.saturating_sub(percent));
    u64::try_from(u128::from(guest) * kept / 100).unwrap_or(u64::MAX)
}
