// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolution of KubeVirt VirtualMachines against instance types and
//! preferences.
//!
//! Overlay files are decoded with [`decode_objects`] into registries; a
//! root document decoded with [`decode_root`] is then turned by a
//! [`Resolver`] into a single VirtualMachineInstance plus the host context
//! needed to convert it into a domain.

pub mod decode;
pub mod field;
pub mod instancetype;
pub mod preference;
pub mod registry;
pub mod resolve;

pub use decode::{
    decode_objects, decode_root, DecodeError, Object, ObjectKind, Overlay,
    Scope,
};
pub use field::{Conflicts, FieldPath};
pub use registry::{InstancetypeRegistry, PreferenceRegistry, Registry};
pub use resolve::{
    OverlayClass, OverlayRef, ResolutionError, Resolved, Resolver, RootSpec,
};
