use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TypeError;

/// Sign/magnitude arbitrary-precision integer.
///
/// The magnitude is stored as little-endian `u64` words and kept normalized:
/// no trailing zero words, and zero is always non-negative. Equality and
/// ordering are numeric.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BigInt {
    negative: bool,
    words: Vec<u64>,
}

impl BigInt {
    /// The integer zero.
    pub fn zero() -> Self {
        Self {
            negative: false,
            words: Vec::new(),
        }
    }

    /// Build from raw sign and little-endian words, normalizing.
    pub fn from_words(negative: bool, words: Vec<u64>) -> Self {
        let mut out = Self { negative, words };
        out.normalize();
        out
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_words(false, vec![value])
    }

    pub fn from_i64(value: i64) -> Self {
        Self::from_i128(value as i128)
    }

    pub fn from_i128(value: i128) -> Self {
        let negative = value < 0;
        let magnitude = value.unsigned_abs();
        let words = vec![magnitude as u64, (magnitude >> 64) as u64];
        Self::from_words(negative, words)
    }

    pub fn is_zero(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Little-endian magnitude words (no trailing zeros).
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Exact conversion to `i128`.
    pub fn to_i128(&self) -> Result<i128, TypeError> {
        let out_of_range = TypeError::IntOutOfRange { target: "i128" };
        if self.words.len() > 2 {
            return Err(out_of_range);
        }
        let low = self.words.first().copied().unwrap_or(0) as u128;
        let high = self.words.get(1).copied().unwrap_or(0) as u128;
        let magnitude = (high << 64) | low;
        if self.negative {
            // |i128::MIN| = 2^127
            if magnitude > (1u128 << 127) {
                return Err(out_of_range);
            }
            Ok((magnitude as i128).wrapping_neg())
        } else {
            if magnitude > i128::MAX as u128 {
                return Err(out_of_range);
            }
            Ok(magnitude as i128)
        }
    }

    /// Exact conversion to `u64`.
    pub fn to_u64(&self) -> Result<u64, TypeError> {
        let out_of_range = TypeError::IntOutOfRange { target: "u64" };
        if self.negative || self.words.len() > 1 {
            return Err(out_of_range);
        }
        Ok(self.words.first().copied().unwrap_or(0))
    }

    fn normalize(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
        if self.words.is_empty() {
            self.negative = false;
        }
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => return Ordering::Greater,
            (true, false) => return Ordering::Less,
            _ => {}
        }
        let magnitude = self
            .words
            .len()
            .cmp(&other.words.len())
            .then_with(|| self.words.iter().rev().cmp(other.words.iter().rev()));
        if self.negative {
            magnitude.reverse()
        } else {
            magnitude
        }
    }
}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_i128() {
            Ok(value) => write!(f, "{value}"),
            Err(_) => {
                // Past 128 bits, fall back to hex.
                if self.negative {
                    write!(f, "-")?;
                }
                write!(f, "0x")?;
                for word in self.words.iter().rev() {
                    write!(f, "{word:016x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for BigInt {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

/// A persisted error value (message only; stack traces do not cross the
/// persistence boundary).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorValue {
    pub message: String,
}

impl ErrorValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.message)
    }
}

/// The closed set of copy-by-value primitives.
///
/// Scalars are copied into flat records as-is; everything outside this set
/// must be a record, array, map, or blob (and therefore a [`Reference`] on
/// the wire) or it cannot be persisted at all.
///
/// [`Reference`]: crate::Reference
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Int(BigInt),
    Text(String),
    Date(DateTime<Utc>),
    /// Regular-expression source. Stored as text; the engine does not
    /// compile patterns.
    Pattern(String),
    Url(Url),
    Error(ErrorValue),
}

impl Scalar {
    /// Parse and wrap a URL scalar.
    pub fn url(input: &str) -> Result<Self, TypeError> {
        let url = Url::parse(input).map_err(|e| TypeError::InvalidUrl(e.to_string()))?;
        Ok(Self::Url(url))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Number(value) => write!(f, "{value}"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Text(value) => write!(f, "{value}"),
            Scalar::Date(value) => write!(f, "{}", value.to_rfc3339()),
            Scalar::Pattern(value) => write!(f, "{value}"),
            Scalar::Url(value) => write!(f, "{value}"),
            Scalar::Error(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<BigInt> for Scalar {
    fn from(value: BigInt) -> Self {
        Scalar::Int(value)
    }
}
