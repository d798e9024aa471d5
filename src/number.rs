// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::as_conversions, clippy::float_cmp)]

use core::cmp::Ordering;
use core::fmt::{self, Debug, Formatter};
use core::str::FromStr;

use anyhow::{bail, Result};
use serde::ser::Serializer;
use serde::Serialize;

const F64_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53

/// A JSON number that remembers whether it was written as an integer.
///
/// Equality and ordering are numeric: `1`, `1u64` and `1.0` are the same number,
/// matching how a form snapshot compares values coming from different widgets.
#[derive(Clone, Copy)]
pub enum Number {
    UInt(u64),
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_i128(&self) -> Option<i128> {
        match self {
            Number::UInt(v) => Some(*v as i128),
            Number::Int(v) => Some(*v as i128),
            Number::Float(f) if f.fract() == 0.0 && f.abs() <= F64_SAFE_INTEGER => {
                Some(*f as i128)
            }
            Number::Float(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i128().and_then(|v| usize::try_from(v).ok())
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Number::UInt(v) => *v as f64,
            Number::Int(v) => *v as f64,
            Number::Float(f) => *f,
        }
    }

    pub fn is_integer(&self) -> bool {
        match self {
            Number::UInt(_) | Number::Int(_) => true,
            Number::Float(f) => f.is_finite() && f.fract() == 0.0,
        }
    }

    /// Whether `self` is an integral multiple of `divisor`.
    ///
    /// Floating point division leaves residue for values like `0.3 / 0.1`, so the
    /// quotient is accepted when it sits within a relative epsilon of an integer.
    pub fn is_multiple_of(&self, divisor: &Number) -> bool {
        if let (Some(a), Some(b)) = (self.as_i128(), divisor.as_i128()) {
            return b != 0 && a % b == 0;
        }
        let b = divisor.as_f64();
        if b == 0.0 || !b.is_finite() {
            return false;
        }
        let quotient = self.as_f64() / b;
        if !quotient.is_finite() {
            return false;
        }
        (quotient - quotient.round()).abs() <= f64::EPSILON * quotient.abs().max(1.0) * 4.0
    }

    pub fn format_decimal(&self) -> String {
        match self {
            Number::UInt(v) => v.to_string(),
            Number::Int(v) => v.to_string(),
            Number::Float(f) if f.fract() == 0.0 && f.abs() <= F64_SAFE_INTEGER => {
                format!("{}", *f as i64)
            }
            Number::Float(f) => f.to_string(),
        }
    }
}

impl Debug for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Number::UInt(v) => write!(f, "{v}u"),
            Number::Int(v) => write!(f, "{v}i"),
            Number::Float(v) => write!(f, "{v}f"),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_decimal())
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Number::UInt(v) => serializer.serialize_u64(*v),
            Number::Int(v) => serializer.serialize_i64(*v),
            // Integral floats are written without a fractional part.
            Number::Float(f) if f.fract() == 0.0 && f.abs() <= F64_SAFE_INTEGER => {
                serializer.serialize_i64(*f as i64)
            }
            Number::Float(f) => serializer.serialize_f64(*f),
        }
    }
}

impl FromStr for Number {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(v) = s.parse::<u64>() {
            return Ok(Number::UInt(v));
        }
        if let Ok(v) = s.parse::<i64>() {
            return Ok(Number::Int(v));
        }
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Number::Float(v)),
            _ => bail!("`{s}` is not a number"),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_i128(), other.as_i128()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.as_f64().total_cmp(&other.as_f64()),
        }
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        Number::UInt(n)
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        if n >= 0 {
            Number::UInt(n as u64)
        } else {
            Number::Int(n)
        }
    }
}

impl From<usize> for Number {
    fn from(n: usize) -> Self {
        Number::UInt(n as u64)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::from(i64::from(n))
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::Float(n)
    }
}
