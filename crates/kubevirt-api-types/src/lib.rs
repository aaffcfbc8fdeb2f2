// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed model of the KubeVirt objects the converter consumes.
//!
//! Only the fields that the resolution pipeline or the domain converter act
//! on are modeled. Everything else in an input document is ignored on
//! decode, matching the non-strict behavior of the Kubernetes decoder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod instancetype;
pub mod quantity;
pub mod vm;
pub mod vmi;

pub use quantity::{Quantity, QuantityParseError};

/// API group/version of the core KubeVirt kinds.
pub const KUBEVIRT_API_VERSION: &str = "kubevirt.io/v1";

/// API group/version of the instance type and preference kinds.
pub const INSTANCETYPE_API_VERSION: &str = "instancetype.kubevirt.io/v1beta1";

/// The `apiVersion`/`kind` pair carried by every document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

impl TypeMeta {
    pub fn new(api_version: &str, kind: &str) -> Self {
        Self { api_version: api_version.to_owned(), kind: kind.to_owned() }
    }
}

/// The subset of Kubernetes object metadata that survives conversion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// A marker for API fields whose presence is their only content, e.g.
/// `masquerade: {}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Empty {}
