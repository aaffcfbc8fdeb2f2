// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lookup tables of the overlays loaded from overlay files.

use std::collections::BTreeMap;

use kubevirt_api_types::instancetype::{InstancetypeSpec, PreferenceSpec};
use slog::{debug, warn, Logger};

use crate::decode::{Object, Overlay};

/// Overlays of one class keyed by name.
///
/// Namespaced and cluster-scoped overlays share one name space. When two
/// overlays carry the same name the one inserted last wins.
#[derive(Clone, Debug)]
pub struct Registry<S> {
    entries: BTreeMap<String, S>,
}

pub type PreferenceRegistry = Registry<PreferenceSpec>;
pub type InstancetypeRegistry = Registry<InstancetypeSpec>;

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self { entries: BTreeMap::new() }
    }
}

impl<S> Registry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, overlay: Overlay<S>, log: &Logger) {
        let Overlay { name, scope, spec } = overlay;
        if self.entries.insert(name.clone(), spec).is_some() {
            warn!(log, "overlay redefined, keeping the last definition";
                "name" => &name, "scope" => %scope);
        } else {
            debug!(log, "registered overlay"; "name" => &name, "scope" => %scope);
        }
    }

    pub fn get(&self, name: &str) -> Option<&S> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PreferenceRegistry {
    /// Adds every preference among `objects`; other objects are ignored.
    pub fn extend_from_objects(&mut self, objects: Vec<Object>, log: &Logger) {
        for object in objects {
            if let Object::Preference(overlay) = object {
                self.insert(overlay, log);
            }
        }
    }
}

impl InstancetypeRegistry {
    /// Adds every instance type among `objects`; other objects are ignored.
    pub fn extend_from_objects(&mut self, objects: Vec<Object>, log: &Logger) {
        for object in objects {
            if let Object::Instancetype(overlay) = object {
                self.insert(overlay, log);
            }
        }
    }
}
