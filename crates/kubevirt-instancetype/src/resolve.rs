// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolution of a VirtualMachine (or bare instance) into the instance
//! handed to the domain converter.

use kubevirt_api_types::instancetype::{
    InstancetypeSpec, PreferenceSpec, SpreadAcross,
};
use kubevirt_api_types::vm::{OverlayMatcher, VirtualMachine};
use kubevirt_api_types::vmi::VirtualMachineInstance;
use kubevirt_api_types::{ObjectMeta, TypeMeta, KUBEVIRT_API_VERSION};
use libvirt_domain::{ConversionContext, CpuSet, EfiConfiguration};
use slog::{debug, info, Logger};
use strum::Display;
use thiserror::Error;

use crate::decode::{Object, ObjectKind, Scope};
use crate::field::{Conflicts, FieldPath};
use crate::instancetype::apply_instancetype;
use crate::preference::apply_preferences;
use crate::registry::{InstancetypeRegistry, PreferenceRegistry};

/// Path of a VirtualMachine's instance template.
const TEMPLATE_PATH: &str = "spec.template";

/// The two kinds of overlay a VirtualMachine can reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OverlayClass {
    Preference,
    Instancetype,
}

impl OverlayClass {
    pub fn kind(&self, scope: Scope) -> ObjectKind {
        match (self, scope) {
            (OverlayClass::Preference, Scope::Namespaced) => {
                ObjectKind::VirtualMachinePreference
            }
            (OverlayClass::Preference, Scope::Cluster) => {
                ObjectKind::VirtualMachineClusterPreference
            }
            (OverlayClass::Instancetype, Scope::Namespaced) => {
                ObjectKind::VirtualMachineInstancetype
            }
            (OverlayClass::Instancetype, Scope::Cluster) => {
                ObjectKind::VirtualMachineClusterInstancetype
            }
        }
    }
}

/// A validated overlay reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayRef {
    pub name: String,
    pub kind: ObjectKind,
}

impl OverlayRef {
    /// Validates a matcher from a VirtualMachine. Kind names match
    /// case-insensitively, in singular or plural; an absent kind names the
    /// cluster-scoped overlay.
    pub fn from_matcher(
        class: OverlayClass,
        matcher: &OverlayMatcher,
    ) -> Result<Self, ResolutionError> {
        if matcher.name.is_empty() {
            return Err(ResolutionError::EmptyOverlayName(class));
        }

        let scope = match matcher.kind.as_deref() {
            None | Some("") => Scope::Cluster,
            Some(kind) => [Scope::Namespaced, Scope::Cluster]
                .into_iter()
                .find(|scope| {
                    let name: &'static str = class.kind(*scope).into();
                    let kind = kind.to_ascii_lowercase();
                    let name = name.to_ascii_lowercase();
                    kind == name || kind == format!("{name}s")
                })
                .ok_or_else(|| ResolutionError::UnknownOverlayKind {
                    class,
                    kind: kind.to_owned(),
                })?,
        };

        Ok(Self { name: matcher.name.clone(), kind: class.kind(scope) })
    }
}

/// The document being converted.
#[derive(Clone, Debug, PartialEq)]
pub enum RootSpec {
    Vm(Box<VirtualMachine>),
    Instance(Box<VirtualMachineInstance>),
}

impl RootSpec {
    /// Returns `None` for objects that cannot be converted on their own.
    pub fn from_object(object: Object) -> Option<Self> {
        match object {
            Object::VirtualMachine(vm) => Some(RootSpec::Vm(Box::new(vm))),
            Object::VirtualMachineInstance(vmi) => {
                Some(RootSpec::Instance(Box::new(vmi)))
            }
            Object::Preference(_) | Object::Instancetype(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("unknown {} {:?}", .0.kind, .0.name)]
    UnknownOverlay(OverlayRef),

    #[error("unknown {class} kind {kind:?}")]
    UnknownOverlayKind { class: OverlayClass, kind: String },

    #[error("{0} reference has an empty name")]
    EmptyOverlayName(OverlayClass),

    #[error("{0}")]
    OverlayConflict(Conflicts),

    #[error("instance type asserts zero guest vCPUs")]
    NoGuestCpus,

    #[error("{vcpus} vCPUs cannot be spread {across:?} with ratio {ratio}")]
    UnsatisfiableTopology { vcpus: u32, ratio: u32, across: SpreadAcross },
}

/// A resolved instance and the host context to convert it in.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
    pub instance: VirtualMachineInstance,
    pub context: ConversionContext,
}

/// Resolves root documents against loaded overlays. The registries are
/// only read, so one resolver may serve any number of resolutions.
pub struct Resolver<'a> {
    preferences: &'a PreferenceRegistry,
    instancetypes: &'a InstancetypeRegistry,
    efi: EfiConfiguration,
    log: Logger,
}

impl<'a> Resolver<'a> {
    pub fn new(
        preferences: &'a PreferenceRegistry,
        instancetypes: &'a InstancetypeRegistry,
        log: Logger,
    ) -> Self {
        Self {
            preferences,
            instancetypes,
            efi: EfiConfiguration::default(),
            log,
        }
    }

    /// Sets the firmware images recorded in every conversion context.
    pub fn with_efi(mut self, efi: EfiConfiguration) -> Self {
        self.efi = efi;
        self
    }

    pub fn resolve(
        &self,
        root: RootSpec,
        cpu_set: CpuSet,
    ) -> Result<Resolved, ResolutionError> {
        let instance = match root {
            RootSpec::Instance(vmi) => *vmi,
            RootSpec::Vm(vm) => self.resolve_vm(*vm)?,
        };

        debug!(self.log, "host context";
            "cpuset" => %cpu_set, "pinning" => !cpu_set.is_empty());
        let context = ConversionContext::new(cpu_set, self.efi.clone());
        Ok(Resolved { instance, context })
    }

    fn resolve_vm(
        &self,
        vm: VirtualMachine,
    ) -> Result<VirtualMachineInstance, ResolutionError> {
        let preference = vm
            .spec
            .preference
            .as_ref()
            .map(|m| self.lookup_preference(m))
            .transpose()?;
        let instancetype = vm
            .spec
            .instancetype
            .as_ref()
            .map(|m| self.lookup_instancetype(m))
            .transpose()?;

        let template = vm.spec.template.unwrap_or_default();
        let mut vmi = VirtualMachineInstance {
            type_meta: TypeMeta::new(
                KUBEVIRT_API_VERSION,
                ObjectKind::VirtualMachineInstance.into(),
            ),
            metadata: ObjectMeta {
                name: vm.metadata.name,
                namespace: vm.metadata.namespace,
                labels: template.metadata.labels,
                annotations: template.metadata.annotations,
            },
            spec: template.spec,
        };

        if let Some(preference) = preference {
            apply_preferences(preference, &mut vmi);
        }

        if let Some(instancetype) = instancetype {
            let template = FieldPath::new(TEMPLATE_PATH);
            if let Err(e) =
                apply_instancetype(instancetype, preference, &mut vmi, &template)
            {
                if let ResolutionError::OverlayConflict(conflicts) = &e {
                    debug!(self.log, "instance type conflicts";
                        "count" => conflicts.len(),
                        "conflicts" => %conflicts);
                }
                return Err(e);
            }
        }

        Ok(vmi)
    }

    fn lookup_preference(
        &self,
        matcher: &OverlayMatcher,
    ) -> Result<&'a PreferenceSpec, ResolutionError> {
        let overlay = OverlayRef::from_matcher(OverlayClass::Preference, matcher)?;
        let spec = self
            .preferences
            .get(&overlay.name)
            .ok_or_else(|| ResolutionError::UnknownOverlay(overlay.clone()))?;
        info!(self.log, "using preference";
            "name" => &overlay.name, "kind" => %overlay.kind);
        Ok(spec)
    }

    fn lookup_instancetype(
        &self,
        matcher: &OverlayMatcher,
    ) -> Result<&'a InstancetypeSpec, ResolutionError> {
        let overlay =
            OverlayRef::from_matcher(OverlayClass::Instancetype, matcher)?;
        let spec = self
            .instancetypes
            .get(&overlay.name)
            .ok_or_else(|| ResolutionError::UnknownOverlay(overlay.clone()))?;
        info!(self.log, "using instance type";
            "name" => &overlay.name, "kind" => %overlay.kind);
        Ok(spec)
    }
}
