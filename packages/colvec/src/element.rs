//! Element kinds stored in segmented vectors.
//!
//! Every vector is generic over one [`Element`] type from a closed set:
//!
//! ```text
//! Kind     Rust type    Width  Stats  Moments/quantiles
//! Byte     i8           1      yes    yes
//! Short    i16          2      yes    yes
//! Int      i32          4      yes    yes
//! Long     i64          8      yes    yes
//! Float    f32          4      yes    yes
//! Double   f64          8      yes    yes
//! Boolean  bool         1      yes    no
//! String   StringCode   4      no     no
//! ```
//!
//! Encoding is little-endian and bit-exact (floats go through `to_bits`),
//! so a swapped-out segment restores to an identical backing array.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Element Kind ───────────────────────────────────────────────────

/// Element kind tag (stored as u8 in swap image headers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementKind {
    Byte = 0,
    Short = 1,
    Int = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    Boolean = 6,
    String = 7,
}

impl ElementKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Byte),
            1 => Some(Self::Short),
            2 => Some(Self::Int),
            3 => Some(Self::Long),
            4 => Some(Self::Float),
            5 => Some(Self::Double),
            6 => Some(Self::Boolean),
            7 => Some(Self::String),
            _ => None,
        }
    }

    /// Encoded width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Byte | Self::Boolean => 1,
            Self::Short => 2,
            Self::Int | Self::Float | Self::String => 4,
            Self::Long | Self::Double => 8,
        }
    }

    /// Whether per-segment stats (count/min/max) are kept.
    pub fn tracks_stats(self) -> bool {
        !matches!(self, Self::String)
    }

    /// Whether moments (sum, sum of squares) and quantiles apply.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Boolean | Self::String)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

// ── String Code ────────────────────────────────────────────────────

/// Integer code issued by a [`StringDictionary`](crate::string_table::StringDictionary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct StringCode(pub u32);

impl fmt::Display for StringCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Element Trait ──────────────────────────────────────────────────

/// Distinctness key used when collecting unique values.
///
/// Integer-like kinds map to their value; floats map to the index of their
/// rounding bucket, or to their bit pattern when no resolution applies.
pub type DistinctKey = i128;

/// Offset that keeps bit-pattern keys disjoint from bucket keys.
const BITS_KEY_OFFSET: i128 = 1 << 64;

pub trait Element: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    const KIND: ElementKind;

    /// Append the little-endian encoding of `self` to `out`.
    fn encode(self, out: &mut Vec<u8>);

    /// Decode from exactly `KIND.width()` bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Numeric value, for kinds that support moments.
    fn to_f64(self) -> Option<f64>;

    /// Natural total order.
    fn compare(&self, other: &Self) -> Ordering;

    /// Key under which values count as the same unique value.
    fn distinct_key(self, resolution: f64) -> DistinctKey;
}

macro_rules! impl_integer_element {
    ($ty:ty, $kind:expr) => {
        impl Element for $ty {
            const KIND: ElementKind = $kind;

            #[inline]
            fn encode(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn decode(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }

            #[inline]
            fn to_f64(self) -> Option<f64> {
                Some(self as f64)
            }

            #[inline]
            fn compare(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }

            #[inline]
            fn distinct_key(self, _resolution: f64) -> DistinctKey {
                self as DistinctKey
            }
        }
    };
}

impl_integer_element!(i8, ElementKind::Byte);
impl_integer_element!(i16, ElementKind::Short);
impl_integer_element!(i32, ElementKind::Int);
impl_integer_element!(i64, ElementKind::Long);

/// Bucket key for a float under `resolution`.
fn float_distinct_key(value: f64, bits: u64, resolution: f64) -> DistinctKey {
    if resolution > 0.0 && value.is_finite() {
        let bucket = (value / resolution).round();
        if bucket.abs() < i64::MAX as f64 {
            return bucket as i64 as DistinctKey;
        }
    }
    BITS_KEY_OFFSET + bits as DistinctKey
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::Float;

    #[inline]
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bits().to_le_bytes());
    }

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        f32::from_bits(u32::from_le_bytes(buf))
    }

    #[inline]
    fn to_f64(self) -> Option<f64> {
        Some(self as f64)
    }

    #[inline]
    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn distinct_key(self, resolution: f64) -> DistinctKey {
        // -0.0 and 0.0 are the same value
        let canonical = if self == 0.0 { 0.0f32 } else { self };
        float_distinct_key(canonical as f64, canonical.to_bits() as u64, resolution)
    }
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::Double;

    #[inline]
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bits().to_le_bytes());
    }

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        f64::from_bits(u64::from_le_bytes(buf))
    }

    #[inline]
    fn to_f64(self) -> Option<f64> {
        Some(self)
    }

    #[inline]
    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn distinct_key(self, resolution: f64) -> DistinctKey {
        let canonical = if self == 0.0 { 0.0f64 } else { self };
        float_distinct_key(canonical, canonical.to_bits(), resolution)
    }
}

impl Element for bool {
    const KIND: ElementKind = ElementKind::Boolean;

    #[inline]
    fn encode(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn to_f64(self) -> Option<f64> {
        None
    }

    #[inline]
    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    #[inline]
    fn distinct_key(self, _resolution: f64) -> DistinctKey {
        self as DistinctKey
    }
}

impl Element for StringCode {
    const KIND: ElementKind = ElementKind::String;

    #[inline]
    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_le_bytes());
    }

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        StringCode(u32::from_le_bytes(buf))
    }

    #[inline]
    fn to_f64(self) -> Option<f64> {
        None
    }

    #[inline]
    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    #[inline]
    fn distinct_key(self, _resolution: f64) -> DistinctKey {
        self.0 as DistinctKey
    }
}
