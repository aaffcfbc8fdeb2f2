// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The VirtualMachine kind: a template for instances plus optional
//! references to an instance type and a preference.

use serde::{Deserialize, Serialize};

use crate::vmi::VirtualMachineInstanceSpec;
use crate::{ObjectMeta, TypeMeta};

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct VirtualMachine {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VirtualMachineSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    pub running: Option<bool>,
    pub run_strategy: Option<String>,
    pub instancetype: Option<OverlayMatcher>,
    pub preference: Option<OverlayMatcher>,
    pub template: Option<VirtualMachineInstanceTemplateSpec>,
}

/// Reference from a VirtualMachine to a named instance type or preference.
///
/// `kind` selects between the namespaced and the cluster-scoped variant of
/// the overlay; when absent the cluster-scoped variant is meant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OverlayMatcher {
    #[serde(default)]
    pub name: String,
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct VirtualMachineInstanceTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VirtualMachineInstanceSpec,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_vm_with_overlays() {
        let raw = r#"
apiVersion: kubevirt.io/v1
kind: VirtualMachine
metadata:
  name: testvm
  namespace: prod
spec:
  running: true
  instancetype:
    name: small
  preference:
    kind: VirtualMachinePreference
    name: fedora
  template:
    metadata:
      labels:
        kubevirt.io/domain: testvm
    spec:
      domain:
        devices: {}
"#;
        let vm: VirtualMachine = serde_yaml::from_str(raw).unwrap();
        assert_eq!(vm.metadata.namespace, "prod");

        let it = vm.spec.instancetype.unwrap();
        assert_eq!(it.name, "small");
        assert_eq!(it.kind, None);

        let pref = vm.spec.preference.unwrap();
        assert_eq!(pref.kind.as_deref(), Some("VirtualMachinePreference"));

        let template = vm.spec.template.unwrap();
        assert_eq!(template.metadata.labels.len(), 1);
    }
}
