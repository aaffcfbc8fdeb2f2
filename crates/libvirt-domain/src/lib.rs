// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion of KubeVirt instances into libvirt domains.
//!
//! A [`Converter`] maps a resolved `VirtualMachineInstance` plus a
//! [`ConversionContext`] describing the host onto a [`Domain`], whose
//! [`DomainSpec`] renders to XML through [`to_xml`].

pub mod context;
pub mod convert;
pub mod cpuset;
pub mod schema;
pub mod xml;

pub use context::{Cell, ConversionContext, EfiConfiguration, Topology};
pub use convert::{Arch, ConversionError, Converter, LibvirtConverter};
pub use cpuset::{CpuSet, CpuSetParseError};
pub use schema::{Domain, DomainSpec};
pub use xml::{to_xml, SerializeError};
