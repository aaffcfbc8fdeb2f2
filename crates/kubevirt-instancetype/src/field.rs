// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dotted field paths and the conflict sets built from them.

use std::fmt::Display;

/// A dotted path to a field of a VirtualMachine, e.g.
/// `spec.template.spec.domain.cpu.cores`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(path: &str) -> Self {
        Self(path.to_owned())
    }

    /// Extends the path by one or more dotted segments.
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}.{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields set by both the template and the selected instance type, in the
/// order they were found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conflicts(Vec<FieldPath>);

impl Conflicts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: FieldPath) {
        self.0.push(path);
    }

    /// Records `path` when `set` holds.
    pub fn check(&mut self, set: bool, path: FieldPath) {
        if set {
            self.push(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPath> {
        self.0.iter()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p.as_str() == path)
    }
}

impl Display for Conflicts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VM field(s) ")?;
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{path}")?;
        }
        f.write_str(" conflicts with selected instance type")
    }
}
