// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kubernetes resource quantities ("2Gi", "500m", "1e3").

use std::fmt::Display;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const BINARY_SUFFIXES: &[(&str, u32)] =
    &[("Ki", 10), ("Mi", 20), ("Gi", 30), ("Ti", 40), ("Pi", 50), ("Ei", 60)];

const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityParseError {
    #[error("quantity is empty")]
    Empty,

    #[error("invalid number in quantity {0:?}")]
    InvalidNumber(String),

    #[error("unknown suffix {suffix:?} in quantity {quantity:?}")]
    UnknownSuffix { quantity: String, suffix: String },

    #[error("quantity {0:?} is out of range")]
    OutOfRange(String),
}

/// A resource amount. The original spelling is kept so that a quantity
/// passes through resolution unchanged; the numeric value is computed once
/// at parse time and kept in thousandths of a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quantity {
    repr: String,
    millis: i128,
}

impl Quantity {
    /// Builds the canonical binary-suffixed quantity for a byte count, e.g.
    /// `4294967296` becomes `4Gi`.
    pub fn from_bytes(bytes: u64) -> Self {
        let repr = BINARY_SUFFIXES
            .iter()
            .rev()
            .find(|(_, shift)| bytes != 0 && bytes % (1u64 << shift) == 0)
            .map(|(suffix, shift)| format!("{}{}", bytes >> shift, suffix))
            .unwrap_or_else(|| bytes.to_string());

        Self { repr, millis: i128::from(bytes) * 1000 }
    }

    pub fn as_str(&self) -> &str {
        &self.repr
    }

    /// The amount in thousandths of a unit, rounded up.
    #[inline]
    pub fn millis(&self) -> i128 {
        self.millis
    }

    /// The amount in whole units, rounded up.
    pub fn value(&self) -> i128 {
        div_ceil(self.millis, 1000)
    }

    /// The amount as a byte count; negative amounts clamp to zero.
    pub fn bytes(&self) -> u64 {
        u64::try_from(self.value().max(0)).unwrap_or(u64::MAX)
    }
}

fn div_ceil(n: i128, d: i128) -> i128 {
    let q = n / d;
    if n % d > 0 {
        q + 1
    } else {
        q
    }
}

fn parse_millis(s: &str) -> Result<i128, QuantityParseError> {
    let out_of_range = || QuantityParseError::OutOfRange(s.to_owned());
    let invalid = || QuantityParseError::InvalidNumber(s.to_owned());

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(QuantityParseError::Empty);
    }

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let split = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(split);

    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
        return Err(invalid());
    }

    let mantissa: i128 =
        format!("{whole}{frac}").parse().map_err(|_| invalid())?;
    let scale = u32::try_from(frac.len()).map_err(|_| out_of_range())?;

    // The amount is mantissa * num / (den * 10^scale).
    let (num, den): (i128, i128) = if suffix.is_empty() {
        (1, 1)
    } else if let Some((_, shift)) =
        BINARY_SUFFIXES.iter().find(|(name, _)| *name == suffix)
    {
        (1i128 << shift, 1)
    } else if let Some((_, exp)) =
        DECIMAL_SUFFIXES.iter().find(|(name, _)| *name == suffix)
    {
        pow10_ratio(*exp).ok_or_else(out_of_range)?
    } else if let Some(exp) =
        suffix.strip_prefix('e').or_else(|| suffix.strip_prefix('E'))
    {
        let exp: i32 = exp.parse().map_err(|_| {
            QuantityParseError::UnknownSuffix {
                quantity: s.to_owned(),
                suffix: suffix.to_owned(),
            }
        })?;
        pow10_ratio(exp).ok_or_else(out_of_range)?
    } else {
        return Err(QuantityParseError::UnknownSuffix {
            quantity: s.to_owned(),
            suffix: suffix.to_owned(),
        });
    };

    let numerator = mantissa
        .checked_mul(num)
        .and_then(|v| v.checked_mul(1000))
        .ok_or_else(out_of_range)?;
    let denominator = 10i128
        .checked_pow(scale)
        .and_then(|v| v.checked_mul(den))
        .ok_or_else(out_of_range)?;

    let millis = div_ceil(numerator, denominator);
    Ok(if negative { -millis } else { millis })
}

fn pow10_ratio(exp: i32) -> Option<(i128, i128)> {
    let pow = 10i128.checked_pow(exp.unsigned_abs())?;
    Some(if exp >= 0 { (pow, 1) } else { (1, pow) })
}

impl FromStr for Quantity {
    type Err = QuantityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let millis = parse_millis(s)?;
        Ok(Self { repr: s.trim().to_owned(), millis })
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repr)
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.repr)
    }
}

struct QuantityVisitor;

impl de::Visitor<'_> for QuantityVisitor {
    type Value = Quantity;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a resource quantity such as \"2Gi\" or 500")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
        Quantity::from_str(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
        self.visit_str(&v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
        self.visit_str(&v.to_string())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Quantity, E> {
        self.visit_str(&v.to_string())
    }
}

impl<'d> Deserialize<'d> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'d>,
    {
        deserializer.deserialize_any(QuantityVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_test::{assert_de_tokens, assert_tokens, Token};

    const GI: i128 = 1 << 30;

    const TEST_CASES: &[(&str, Option<i128>)] = &[
        ("0", Some(0)),
        ("128", Some(128_000)),
        ("2Gi", Some(2 * GI * 1000)),
        ("1.5Gi", Some(3 * (GI / 2) * 1000)),
        ("512Mi", Some(512 * (1 << 20) * 1000)),
        ("500m", Some(500)),
        ("1k", Some(1_000_000)),
        ("4M", Some(4_000_000_000)),
        ("1e3", Some(1_000_000)),
        ("1E", Some(1_000_000_000_000_000_000_000)),
        ("+3", Some(3000)),
        ("-2", Some(-2000)),
        ("1n", Some(1)),
        ("", None),
        ("Gi", None),
        ("1.2.3", None),
        ("12 apples", None),
        ("2GB", None),
        ("1ex", None),
    ];

    #[test]
    fn quantity_from_str() {
        for (input, expected) in TEST_CASES {
            match (Quantity::from_str(input), expected) {
                (Ok(q), Some(millis)) => {
                    assert_eq!(q.millis(), *millis, "parsing {input:?}")
                }
                (Err(_), None) => {}
                (result, _) => {
                    panic!("unexpected result parsing {input:?}: {result:?}")
                }
            }
        }
    }

    #[test]
    fn whole_units_round_up() {
        let q = Quantity::from_str("1500m").unwrap();
        assert_eq!(q.value(), 2);
        let q = Quantity::from_str("100m").unwrap();
        assert_eq!(q.value(), 1);
        assert_eq!(Quantity::from_str("2Gi").unwrap().bytes(), 2 << 30);
    }

    #[test]
    fn canonical_binary_form() {
        assert_eq!(Quantity::from_bytes(4 << 30).as_str(), "4Gi");
        assert_eq!(Quantity::from_bytes(3 << 29).as_str(), "1536Mi");
        assert_eq!(Quantity::from_bytes(1000).as_str(), "1000");
        assert_eq!(Quantity::from_bytes(0).as_str(), "0");
    }

    #[test]
    fn quantity_serialization() {
        let q = Quantity::from_str("2Gi").unwrap();
        assert_tokens(&q, &[Token::Str("2Gi")]);

        let q = Quantity::from_str("4").unwrap();
        assert_de_tokens(&q, &[Token::U64(4)]);
    }

    #[test]
    fn quantity_from_yaml_integer() {
        let q: Quantity = serde_yaml::from_str("2").unwrap();
        assert_eq!(q.value(), 2);
        assert!(serde_yaml::from_str::<Quantity>("two").is_err());
    }
}
