// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rendering of a domain description as libvirt XML.

use quick_xml::se::Serializer;
use serde::Serialize;
use thiserror::Error;

use crate::schema::DomainSpec;

const INDENT: usize = 2;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to render domain XML: {0}")]
    Xml(String),
}

/// Renders `spec` as an indented `<domain>` document without an XML
/// declaration or trailing newline.
pub fn to_xml(spec: &DomainSpec) -> Result<String, SerializeError> {
    let mut out = String::new();
    let mut ser = Serializer::new(&mut out);
    ser.indent(' ', INDENT);
    spec.serialize(ser).map_err(|e| SerializeError::Xml(e.to_string()))?;
    Ok(out)
}
