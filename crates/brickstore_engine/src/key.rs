//! Keys and key ranges.
//!
//! Keys are the subset of values that can be ordered: numbers, strings,
//! byte strings and arrays of keys. Across types the order is
//! `number < Text < Bytes < Array`; within a type it is the natural one.
//! Integers and floats are both numbers and compare by value, so
//! `Integer(2) == Float(2.0)`.

use crate::error::{EngineError, EngineResult};
use brickstore_codec::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Bound;

/// 2^63, the first float above every `i64`.
const I64_END: f64 = 9_223_372_036_854_775_808.0;

/// An orderable record key.
#[derive(Debug, Clone)]
pub enum Key {
    /// A signed integer key.
    Integer(i64),
    /// A float key.
    ///
    /// Built from a value, a float key is never NaN and never integral
    /// within the `i64` range; those become [`Key::Integer`].
    Float(f64),
    /// A string key.
    Text(String),
    /// A byte string key.
    Bytes(Vec<u8>),
    /// A compound key.
    Array(Vec<Key>),
}

impl Key {
    /// Converts a value into a key, if it is a valid one.
    ///
    /// Null, booleans and maps are not keys; neither is an array that
    /// contains one of them.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(Self::Integer(*n)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => Some(Self::from(*f)),
            Value::Text(s) => Some(Self::Text(s.clone())),
            Value::Bytes(b) => Some(Self::Bytes(b.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            Value::Null | Value::Bool(_) | Value::Map(_) => None,
        }
    }

    /// Converts the key back into a value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Integer(n) => Value::Integer(*n),
            Self::Float(f) => Value::Float(*f),
            Self::Text(s) => Value::Text(s.clone()),
            Self::Bytes(b) => Value::Bytes(b.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }

    /// Returns the integer if this is an integer key.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The largest integer not above a numeric key; what an explicit key
    /// moves a key generator to.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn generator_floor(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            // Saturating cast: huge floats exhaust the generator.
            Self::Float(f) if !f.is_nan() => Some(f.floor() as i64),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Integer(_) | Self::Float(_) => 0,
            Self::Text(_) => 1,
            Self::Bytes(_) => 2,
            Self::Array(_) => 3,
        }
    }
}

/// The integer equal to `f`, if there is one.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn exact_integer(f: f64) -> Option<i64> {
    (f == f.trunc() && (-I64_END..I64_END).contains(&f)).then(|| f as i64)
}

/// Compares an integer with a float by numeric value.
///
/// NaNs sit at the ends, as in [`f64::total_cmp`].
#[allow(clippy::cast_possible_truncation)]
fn cmp_integer_float(n: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= I64_END {
        return Ordering::Less;
    }
    if f < -I64_END {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match n.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&f).unwrap_or(Ordering::Equal),
        unequal => unequal,
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            // `==` first so that 0.0 and -0.0 are one key.
            (Self::Float(a), Self::Float(b)) if a == b => Ordering::Equal,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Integer(a), Self::Float(b)) => cmp_integer_float(*a, *b),
            (Self::Float(a), Self::Integer(b)) => cmp_integer_float(*b, *a).reverse(),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Integer(n) => (0u8, n).hash(state),
            Self::Float(f) => match exact_integer(*f) {
                Some(n) => (0u8, n).hash(state),
                None => (4u8, f.to_bits()).hash(state),
            },
            Self::Text(s) => (1u8, s).hash(state),
            Self::Bytes(b) => (2u8, b).hash(state),
            Self::Array(items) => (3u8, items).hash(state),
        }
    }
}

impl TryFrom<&Value> for Key {
    type Error = EngineError;

    fn try_from(value: &Value) -> EngineResult<Self> {
        Self::from_value(value).ok_or_else(|| EngineError::data(format!("{value:?} is not a valid key")))
    }
}

impl TryFrom<Value> for Key {
    type Error = EngineError;

    fn try_from(value: Value) -> EngineResult<Self> {
        Self::try_from(&value)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        key.to_value()
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for Key {
    /// Integral floats in the `i64` range become integer keys.
    ///
    /// NaN is kept and sorts above every other number; values never
    /// convert to a NaN key.
    fn from(f: f64) -> Self {
        exact_integer(f).map_or(Self::Float(f), Self::Integer)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Key {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => {
                write!(f, "0x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A contiguous interval of keys.
///
/// Ranges are built through the constructors, which reject empty
/// intervals, so every `KeyRange` is safe to hand to a `BTreeMap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Bound<Key>,
    upper: Bound<Key>,
}

impl KeyRange {
    /// A range containing exactly `key`.
    pub fn only(key: impl Into<Key>) -> Self {
        let key = key.into();
        Self {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Every key at or above `key` (above, if `open`).
    pub fn lower_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: bound(key.into(), open),
            upper: Bound::Unbounded,
        }
    }

    /// Every key at or below `key` (below, if `open`).
    pub fn upper_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: bound(key.into(), open),
        }
    }

    /// Keys between `lower` and `upper`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Data`] if `lower > upper`, or if they are
    /// equal and either end is open.
    pub fn bound(
        lower: impl Into<Key>,
        upper: impl Into<Key>,
        lower_open: bool,
        upper_open: bool,
    ) -> EngineResult<Self> {
        let lower = bound(lower.into(), lower_open);
        let upper = bound(upper.into(), upper_open);
        if !is_nonempty(bound_ref(&lower), bound_ref(&upper)) {
            return Err(EngineError::data("lower bound is greater than upper bound"));
        }
        Ok(Self { lower, upper })
    }

    /// The lower end of the range.
    #[must_use]
    pub fn lower(&self) -> Bound<&Key> {
        bound_ref(&self.lower)
    }

    /// The upper end of the range.
    #[must_use]
    pub fn upper(&self) -> Bound<&Key> {
        bound_ref(&self.upper)
    }

    /// Returns true if `key` lies inside the range.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Bound::Included(l) => key >= l,
            Bound::Excluded(l) => key > l,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(u) => key <= u,
            Bound::Excluded(u) => key < u,
            Bound::Unbounded => true,
        };
        above && below
    }
}

impl From<Key> for KeyRange {
    fn from(key: Key) -> Self {
        Self::only(key)
    }
}

fn bound(key: Key, open: bool) -> Bound<Key> {
    if open {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}

fn bound_ref(bound: &Bound<Key>) -> Bound<&Key> {
    match bound {
        Bound::Included(k) => Bound::Included(k),
        Bound::Excluded(k) => Bound::Excluded(k),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Bounds of an optional range.
pub(crate) fn range_bounds(range: Option<&KeyRange>) -> (Bound<&Key>, Bound<&Key>) {
    match range {
        Some(range) => (range.lower(), range.upper()),
        None => (Bound::Unbounded, Bound::Unbounded),
    }
}

/// Returns true if at least one key can fall between the bounds.
///
/// `BTreeMap::range` panics on inverted bounds, so every range query
/// checks this first.
pub(crate) fn is_nonempty(lower: Bound<&Key>, upper: Bound<&Key>) -> bool {
    match (lower, upper) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
        (Bound::Included(l), Bound::Included(u)) => l <= u,
        (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) => l < u,
    }
}
