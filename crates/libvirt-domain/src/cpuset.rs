// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host CPU sets in Linux list format, e.g. "0,2-4".

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Highest CPU index accepted when parsing, matching the largest
/// `NR_CPUS` Linux can be built with.
pub const MAX_CPU: u32 = 8191;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CpuSetParseError {
    #[error("invalid CPU index {0:?}")]
    InvalidCpu(String),

    #[error("CPU index {0} is above the maximum of {}", MAX_CPU)]
    CpuOutOfRange(u32),

    #[error("range {0:?} ends before it starts")]
    ReversedRange(String),

    #[error("empty entry in CPU list {0:?}")]
    EmptyEntry(String),
}

/// An ordered set of host CPU indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CpuSet(BTreeSet<u32>);

impl CpuSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// CPU indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for CpuSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for CpuSet {
    type Err = CpuSetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut set = BTreeSet::new();
        if s.is_empty() {
            return Ok(Self(set));
        }

        let parse_cpu = |item: &str| {
            let cpu = u32::from_str(item.trim())
                .map_err(|_| CpuSetParseError::InvalidCpu(item.to_owned()))?;
            if cpu > MAX_CPU {
                return Err(CpuSetParseError::CpuOutOfRange(cpu));
            }
            Ok(cpu)
        };

        for item in s.split(',').map(str::trim) {
            if item.is_empty() {
                return Err(CpuSetParseError::EmptyEntry(s.to_owned()));
            }

            match item.split_once('-') {
                Some((first, last)) => {
                    let (first, last) = (parse_cpu(first)?, parse_cpu(last)?);
                    if last < first {
                        return Err(CpuSetParseError::ReversedRange(
                            item.to_owned(),
                        ));
                    }
                    set.extend(first..=last);
                }
                None => {
                    set.insert(parse_cpu(item)?);
                }
            }
        }

        Ok(Self(set))
    }
}

impl Display for CpuSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut cpus = self.iter().peekable();
        let mut first = true;
        while let Some(start) = cpus.next() {
            let mut end = start;
            while let Some(next) = end.checked_add(1) {
                if cpus.peek() != Some(&next) {
                    break;
                }
                end = next;
                cpus.next();
            }

            if !first {
                f.write_str(",")?;
            }
            first = false;

            if end == start {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}-{end}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for CpuSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'d> Deserialize<'d> for CpuSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'d>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(de::Error::custom)
    }
}
