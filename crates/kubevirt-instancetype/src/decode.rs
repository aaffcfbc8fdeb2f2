// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of (multi-document) YAML streams into typed KubeVirt objects.

use std::io::Read;
use std::str::FromStr;

use kubevirt_api_types::instancetype::{
    InstancetypeSpec, PreferenceSpec, VirtualMachineInstancetype,
    VirtualMachinePreference,
};
use kubevirt_api_types::vm::VirtualMachine;
use kubevirt_api_types::vmi::VirtualMachineInstance;
use kubevirt_api_types::{
    TypeMeta, INSTANCETYPE_API_VERSION, KUBEVIRT_API_VERSION,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use slog::{debug, Logger};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Every object kind the decoder knows how to build.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
)]
pub enum ObjectKind {
    VirtualMachine,
    VirtualMachineInstance,
    VirtualMachinePreference,
    VirtualMachineClusterPreference,
    VirtualMachineInstancetype,
    VirtualMachineClusterInstancetype,
}

impl ObjectKind {
    /// Kinds accepted as the document being converted.
    pub const ROOTS: &'static [ObjectKind] =
        &[ObjectKind::VirtualMachine, ObjectKind::VirtualMachineInstance];

    /// Kinds accepted in preference files.
    pub const PREFERENCES: &'static [ObjectKind] = &[
        ObjectKind::VirtualMachinePreference,
        ObjectKind::VirtualMachineClusterPreference,
    ];

    /// Kinds accepted in instance type files.
    pub const INSTANCETYPES: &'static [ObjectKind] = &[
        ObjectKind::VirtualMachineInstancetype,
        ObjectKind::VirtualMachineClusterInstancetype,
    ];

    pub fn api_version(&self) -> &'static str {
        match self {
            ObjectKind::VirtualMachine | ObjectKind::VirtualMachineInstance => {
                KUBEVIRT_API_VERSION
            }
            _ => INSTANCETYPE_API_VERSION,
        }
    }

    /// Looks up the kind named by a document's type metadata.
    pub fn from_type_meta(meta: &TypeMeta) -> Option<Self> {
        ObjectKind::from_str(&meta.kind)
            .ok()
            .filter(|kind| kind.api_version() == meta.api_version)
    }
}

/// Whether an overlay is namespaced or cluster-wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    Namespaced,
    Cluster,
}

/// A named preference or instance type, stripped of its document shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay<S> {
    pub name: String,
    pub scope: Scope,
    pub spec: S,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    VirtualMachine(VirtualMachine),
    VirtualMachineInstance(VirtualMachineInstance),
    Preference(Overlay<PreferenceSpec>),
    Instancetype(Overlay<InstancetypeSpec>),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read input")]
    Io(#[from] std::io::Error),

    #[error("input is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("document {index} is not valid YAML")]
    Malformed {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("document {index} has no apiVersion or kind")]
    MissingTypeMeta { index: usize },

    #[error("document {index} has unrecognized kind {kind:?} ({api_version})")]
    UnrecognizedKind { index: usize, api_version: String, kind: String },

    #[error("document {index}: unexpected kind {kind}")]
    UnexpectedKind { index: usize, kind: ObjectKind },

    #[error("expected exactly one VirtualMachine or VirtualMachineInstance, found {0}")]
    RootCount(usize),
}

/// Decodes every document in `reader`, failing on the first document that
/// is malformed or whose kind is not in `allowed`.
///
/// Empty documents are skipped; the objects come back in document order.
pub fn decode_objects<R: Read>(
    mut reader: R,
    allowed: &[ObjectKind],
    log: &Logger,
) -> Result<Vec<Object>, DecodeError> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;
    let raw = String::from_utf8(raw)?;

    let mut objects = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(&raw).enumerate()
    {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|source| DecodeError::Malformed { index, source })?;
        if value.is_null() {
            continue;
        }

        let meta: TypeMeta = typed(index, value.clone())?;
        if meta.api_version.is_empty() || meta.kind.is_empty() {
            return Err(DecodeError::MissingTypeMeta { index });
        }
        let kind = ObjectKind::from_type_meta(&meta).ok_or_else(|| {
            DecodeError::UnrecognizedKind {
                index,
                api_version: meta.api_version.clone(),
                kind: meta.kind.clone(),
            }
        })?;
        if !allowed.contains(&kind) {
            return Err(DecodeError::UnexpectedKind { index, kind });
        }

        let object = match kind {
            ObjectKind::VirtualMachine => {
                Object::VirtualMachine(typed(index, value)?)
            }
            ObjectKind::VirtualMachineInstance => {
                Object::VirtualMachineInstance(typed(index, value)?)
            }
            ObjectKind::VirtualMachinePreference
            | ObjectKind::VirtualMachineClusterPreference => {
                let pref: VirtualMachinePreference = typed(index, value)?;
                Object::Preference(Overlay {
                    name: pref.metadata.name,
                    scope: scope_of(kind),
                    spec: pref.spec,
                })
            }
            ObjectKind::VirtualMachineInstancetype
            | ObjectKind::VirtualMachineClusterInstancetype => {
                let it: VirtualMachineInstancetype = typed(index, value)?;
                Object::Instancetype(Overlay {
                    name: it.metadata.name,
                    scope: scope_of(kind),
                    spec: it.spec,
                })
            }
        };

        debug!(log, "decoded document"; "index" => index, "kind" => %kind);
        objects.push(object);
    }

    Ok(objects)
}

/// Decodes a stream that must hold exactly one VirtualMachine or
/// VirtualMachineInstance.
pub fn decode_root<R: Read>(
    reader: R,
    log: &Logger,
) -> Result<Object, DecodeError> {
    let mut objects = decode_objects(reader, ObjectKind::ROOTS, log)?;
    match objects.len() {
        1 => Ok(objects.remove(0)),
        n => Err(DecodeError::RootCount(n)),
    }
}

fn typed<T: DeserializeOwned>(
    index: usize,
    value: serde_yaml::Value,
) -> Result<T, DecodeError> {
    serde_yaml::from_value(value)
        .map_err(|source| DecodeError::Malformed { index, source })
}

fn scope_of(kind: ObjectKind) -> Scope {
    match kind {
        ObjectKind::VirtualMachineClusterPreference
        | ObjectKind::VirtualMachineClusterInstancetype => Scope::Cluster,
        _ => Scope::Namespaced,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    const PREFERENCES: &str = r#"
apiVersion: instancetype.kubevirt.io/v1beta1
kind: VirtualMachineClusterPreference
metadata:
  name: fedora
spec:
  devices:
    preferredDiskBus: virtio
---
apiVersion: instancetype.kubevirt.io/v1beta1
kind: VirtualMachinePreference
metadata:
  name: windows
spec:
  features:
    preferredSmm: {}
---
"#;

    #[test]
    fn decodes_documents_in_order() {
        let objects = decode_objects(
            PREFERENCES.as_bytes(),
            ObjectKind::PREFERENCES,
            &logger(),
        )
        .unwrap();

        let names: Vec<_> = objects
            .iter()
            .map(|o| match o {
                Object::Preference(p) => (p.name.as_str(), p.scope),
                other => panic!("unexpected object {other:?}"),
            })
            .collect();
        assert_eq!(
            names,
            [("fedora", Scope::Cluster), ("windows", Scope::Namespaced)]
        );
    }

    #[test]
    fn empty_input_is_not_an_error() {
        for input in ["", "---\n", "# nothing here\n"] {
            let objects =
                decode_objects(input.as_bytes(), ObjectKind::ROOTS, &logger())
                    .unwrap();
            assert!(objects.is_empty(), "input {input:?}");
        }
    }

    #[test]
    fn disallowed_kind_fails_whole_stream() {
        let err = decode_objects(
            PREFERENCES.as_bytes(),
            ObjectKind::INSTANCETYPES,
            &logger(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnexpectedKind {
                index: 0,
                kind: ObjectKind::VirtualMachineClusterPreference
            }
        ));
    }

    #[test]
    fn binary_input_is_not_a_read_failure() {
        let input: &[u8] = b"kind: VirtualMachine\nname: \xff\xfe\n";
        let err =
            decode_objects(input, ObjectKind::ROOTS, &logger()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidUtf8(_)), "{err:?}");
        assert_eq!(err.to_string(), "input is not valid UTF-8");
    }

    #[test]
    fn trailing_malformed_document_fails() {
        let input = format!("{PREFERENCES}kind: [unterminated\n");
        let err =
            decode_objects(input.as_bytes(), ObjectKind::PREFERENCES, &logger())
                .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }), "{err:?}");
    }

    #[test]
    fn type_meta_is_checked() {
        let missing = "metadata:\n  name: x\n";
        assert!(matches!(
            decode_objects(missing.as_bytes(), ObjectKind::ROOTS, &logger()),
            Err(DecodeError::MissingTypeMeta { index: 0 })
        ));

        let wrong_version = "apiVersion: kubevirt.io/v1alpha3\nkind: VirtualMachine\n";
        assert!(matches!(
            decode_objects(wrong_version.as_bytes(), ObjectKind::ROOTS, &logger()),
            Err(DecodeError::UnrecognizedKind { .. })
        ));

        let unknown = "apiVersion: v1\nkind: Pod\n";
        assert!(matches!(
            decode_objects(unknown.as_bytes(), ObjectKind::ROOTS, &logger()),
            Err(DecodeError::UnrecognizedKind { .. })
        ));
    }

    #[test]
    fn root_must_be_single_document() {
        let vm = "apiVersion: kubevirt.io/v1\nkind: VirtualMachine\nmetadata:\n  name: a\n";
        assert!(matches!(
            decode_root(vm.as_bytes(), &logger()),
            Ok(Object::VirtualMachine(_))
        ));

        let two = format!("{vm}---\n{vm}");
        assert!(matches!(
            decode_root(two.as_bytes(), &logger()),
            Err(DecodeError::RootCount(2))
        ));
        assert!(matches!(
            decode_root("".as_bytes(), &logger()),
            Err(DecodeError::RootCount(0))
        ));
    }
}
