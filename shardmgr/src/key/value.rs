use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use uuid::Uuid;

use super::codec;
use super::kind::ShardKeyType;
use crate::key::error::KeyError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Encoding {
    /// A concrete, comparable value, stored in canonical byte-lex form.
    Finite(Vec<u8>),
    /// The `+∞` sentinel for this key kind. Kept as a distinct variant
    /// rather than a reserved byte pattern, which is how spec.md's source
    /// material distinguishes it from a legitimate empty byte-string key —
    /// an enum makes that distinction a type-level fact instead of a flag
    /// byte callers must remember to check.
    Max,
}

/// A typed shard key: one value drawn from [`ShardKeyType`], encoded
/// canonically so two keys of the same kind compare byte-lexically in
/// their natural order (spec.md §3, §4.A).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardKey {
    kind: ShardKeyType,
    encoding: Encoding,
}

impl ShardKey {
    fn finite(kind: ShardKeyType, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            encoding: Encoding::Finite(bytes),
        }
    }

    pub fn from_i32(value: i32) -> Self {
        Self::finite(ShardKeyType::Int32, codec::encode_i32(value))
    }

    pub fn from_i64(value: i64) -> Self {
        Self::finite(ShardKeyType::Int64, codec::encode_i64(value))
    }

    pub fn from_guid(value: Uuid) -> Self {
        Self::finite(ShardKeyType::Guid, codec::encode_guid(value))
    }

    pub fn from_bytes(value: impl AsRef<[u8]>) -> Self {
        Self::finite(ShardKeyType::Bytes, codec::encode_bytes(value.as_ref()))
    }

    pub fn from_datetime(value: NaiveDateTime) -> Self {
        Self::finite(ShardKeyType::DateTime, codec::encode_datetime(value))
    }

    pub fn from_datetime_offset(value: DateTime<FixedOffset>) -> Self {
        Self::finite(
            ShardKeyType::DateTimeOffset,
            codec::encode_datetime_offset(value),
        )
    }

    pub fn from_timespan(value: chrono::Duration) -> Self {
        Self::finite(ShardKeyType::TimeSpan, codec::encode_timespan(value))
    }

    /// Rebuilds a key from kind-tagged canonical bytes, as read back from a
    /// store row. Callers that already know the key's kind (from the
    /// owning shard map) use this instead of the `from_*` constructors,
    /// which each hardcode their own kind.
    pub fn from_canonical(kind: ShardKeyType, bytes: Vec<u8>) -> Self {
        Self::finite(kind, bytes)
    }

    /// The `+∞` sentinel for `kind`. Compares greater than every finite key
    /// of the same kind (spec.md §3).
    pub fn max(kind: ShardKeyType) -> Self {
        Self {
            kind,
            encoding: Encoding::Max,
        }
    }

    pub fn kind(&self) -> ShardKeyType {
        self.kind
    }

    pub fn is_max(&self) -> bool {
        matches!(self.encoding, Encoding::Max)
    }

    /// Canonical bytes of a finite key. `None` for the `+∞` sentinel —
    /// there is no byte string that represents it.
    pub fn canonical_bytes(&self) -> Option<&[u8]> {
        match &self.encoding {
            Encoding::Finite(bytes) => Some(bytes),
            Encoding::Max => None,
        }
    }

    pub fn to_i32(&self) -> Option<i32> {
        self.canonical_bytes()
            .filter(|_| self.kind == ShardKeyType::Int32)
            .map(codec::decode_i32)
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.canonical_bytes()
            .filter(|_| self.kind == ShardKeyType::Int64)
            .map(codec::decode_i64)
    }

    pub fn to_guid(&self) -> Option<Uuid> {
        self.canonical_bytes()
            .filter(|_| self.kind == ShardKeyType::Guid)
            .map(codec::decode_guid)
    }

    /// Compare two keys of the same kind. Returns
    /// [`KeyError::KindMismatch`] if they aren't — the operation is
    /// undefined across kinds (spec.md §4.A `compare(k1,k2)`).
    pub fn compare(&self, other: &Self) -> Result<Ordering, KeyError> {
        if self.kind != other.kind {
            return Err(KeyError::KindMismatch {
                left: self.kind,
                right: other.kind,
            });
        }

        Ok(match (&self.encoding, &other.encoding) {
            (Encoding::Max, Encoding::Max) => Ordering::Equal,
            (Encoding::Max, Encoding::Finite(_)) => Ordering::Greater,
            (Encoding::Finite(_), Encoding::Max) => Ordering::Less,
            (Encoding::Finite(a), Encoding::Finite(b)) => a.cmp(b),
        })
    }

    /// The smallest key strictly greater than `self`, used when splitting
    /// a range at a boundary (spec.md §4.A `next(k)`). Overflowing the
    /// largest finite value of a kind rolls over to the `+∞` sentinel, not
    /// an error — the mapper treats it identically to any other key.
    pub fn next(&self) -> Result<Self, KeyError> {
        match &self.encoding {
            Encoding::Max => Err(KeyError::NoSuccessor),
            Encoding::Finite(bytes) => match self.kind {
                ShardKeyType::Bytes => {
                    let mut next = bytes.clone();
                    next.push(0);
                    Ok(Self::finite(self.kind, next))
                }
                _ => match increment_fixed_width(bytes) {
                    Some(incremented) => Ok(Self::finite(self.kind, incremented)),
                    None => Ok(Self::max(self.kind)),
                },
            },
        }
    }
}

/// Treats `bytes` as a big-endian unsigned integer and adds one.
/// Returns `None` on overflow (all bits set).
fn increment_fixed_width(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = bytes.to_vec();
    for byte in out.iter_mut().rev() {
        if *byte == 0xFF {
            *byte = 0x00;
        } else {
            *byte += 1;
            return Some(out);
        }
    }
    None
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.encoding {
            Encoding::Max => write!(f, "+inf"),
            Encoding::Finite(bytes) => match self.kind {
                ShardKeyType::Int32 => write!(f, "{}", codec::decode_i32(bytes)),
                ShardKeyType::Int64 => write!(f, "{}", codec::decode_i64(bytes)),
                ShardKeyType::Guid => write!(f, "{}", codec::decode_guid(bytes)),
                _ => write!(f, "0x{}", hex(bytes)),
            },
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_compare_same_kind() {
        let a = ShardKey::from_i32(1);
        let b = ShardKey::from_i32(2);
        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
        assert_eq!(b.compare(&a).unwrap(), Ordering::Greater);
        assert_eq!(a.compare(&a).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_compare_kind_mismatch() {
        let a = ShardKey::from_i32(1);
        let b = ShardKey::from_i64(1);
        assert!(a.compare(&b).is_err());
    }

    #[test]
    fn test_max_greater_than_any_finite() {
        let top = ShardKey::max(ShardKeyType::Int32);
        let finite = ShardKey::from_i32(i32::MAX);
        assert_eq!(top.compare(&finite).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_next_increments() {
        let key = ShardKey::from_i32(41);
        let next = key.next().unwrap();
        assert_eq!(next.to_i32(), Some(42));
    }

    #[test]
    fn test_next_overflows_to_max() {
        let key = ShardKey::from_i32(i32::MAX);
        let next = key.next().unwrap();
        assert!(next.is_max());
    }

    #[test]
    fn test_next_on_bytes_appends_zero() {
        let key = ShardKey::from_bytes(b"ab");
        let next = key.next().unwrap();
        assert_eq!(next.canonical_bytes().unwrap(), b"ab\0");
    }

    #[test]
    fn test_next_on_max_errors() {
        let top = ShardKey::max(ShardKeyType::Int32);
        assert!(top.next().is_err());
    }

    #[test]
    fn test_max_sentinel_distinct_from_empty_bytes() {
        let empty = ShardKey::from_bytes(b"");
        let top = ShardKey::max(ShardKeyType::Bytes);
        assert_ne!(empty, top);
        assert_eq!(empty.compare(&top).unwrap(), Ordering::Less);
    }
}
