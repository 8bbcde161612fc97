use std::cmp::Ordering;

use super::error::KeyError;
use super::kind::ShardKeyType;
use super::value::ShardKey;

/// A half-open interval `[low, high)` of keys of one kind. `high` may be
/// the `+∞` sentinel, meaning unbounded above (spec.md §3 `ShardRange`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardRange {
    low: ShardKey,
    high: ShardKey,
}

impl ShardRange {
    pub fn new(low: ShardKey, high: ShardKey) -> Result<Self, KeyError> {
        if low.kind() != high.kind() {
            return Err(KeyError::RangeKindMismatch {
                low: low.kind(),
                high: high.kind(),
            });
        }

        if low.compare(&high)? != Ordering::Less {
            return Err(KeyError::InvalidRange {
                low: low.to_string(),
                high: high.to_string(),
            });
        }

        Ok(Self { low, high })
    }

    /// The full key space of `kind`: `[min, +inf)`. Used for default shard
    /// maps and whole-map range queries.
    pub fn full(kind: ShardKeyType, min: ShardKey) -> Result<Self, KeyError> {
        Self::new(min, ShardKey::max(kind))
    }

    pub fn low(&self) -> &ShardKey {
        &self.low
    }

    pub fn high(&self) -> &ShardKey {
        &self.high
    }

    pub fn kind(&self) -> ShardKeyType {
        self.low.kind()
    }

    /// `low <= key < high`.
    pub fn contains(&self, key: &ShardKey) -> Result<bool, KeyError> {
        Ok(self.low.compare(key)? != Ordering::Greater && self.high.compare(key)? == Ordering::Greater)
    }

    /// Two half-open ranges overlap iff each one's low is strictly before
    /// the other's high.
    pub fn intersects(&self, other: &Self) -> Result<bool, KeyError> {
        Ok(self.low.compare(&other.high)? == Ordering::Less
            && other.low.compare(&self.high)? == Ordering::Less)
    }

    /// Split at `at`, which must lie strictly inside the range, producing
    /// `([low, at), [at, high))` (spec.md §4.G `split`).
    pub fn split(&self, at: ShardKey) -> Result<(Self, Self), KeyError> {
        if !self.contains(&at)? || self.low.compare(&at)? == Ordering::Equal {
            return Err(KeyError::InvalidRange {
                low: self.low.to_string(),
                high: at.to_string(),
            });
        }

        let left = Self::new(self.low.clone(), at.clone())?;
        let right = Self::new(at, self.high.clone())?;
        Ok((left, right))
    }

    /// Merge with an immediately-following, contiguous range:
    /// `self.high == other.low` (spec.md §4.G `merge`).
    pub fn merge(&self, other: &Self) -> Result<Self, KeyError> {
        if self.high.compare(&other.low)? != Ordering::Equal {
            return Err(KeyError::InvalidRange {
                low: self.low.to_string(),
                high: other.high.to_string(),
            });
        }

        Self::new(self.low.clone(), other.high.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn range(low: i32, high: i32) -> ShardRange {
        ShardRange::new(ShardKey::from_i32(low), ShardKey::from_i32(high)).unwrap()
    }

    #[test]
    fn test_contains() {
        let r = range(0, 100);
        assert!(r.contains(&ShardKey::from_i32(42)).unwrap());
        assert!(r.contains(&ShardKey::from_i32(0)).unwrap());
        assert!(!r.contains(&ShardKey::from_i32(100)).unwrap());
        assert!(!r.contains(&ShardKey::from_i32(-1)).unwrap());
    }

    #[test]
    fn test_invalid_range_rejected() {
        assert!(ShardRange::new(ShardKey::from_i32(10), ShardKey::from_i32(10)).is_err());
        assert!(ShardRange::new(ShardKey::from_i32(10), ShardKey::from_i32(5)).is_err());
    }

    #[test]
    fn test_intersects() {
        let a = range(0, 50);
        let b = range(40, 100);
        let c = range(50, 100);
        assert!(a.intersects(&b).unwrap());
        assert!(!a.intersects(&c).unwrap());
    }

    #[test]
    fn test_split() {
        let r = range(0, 100);
        let (left, right) = r.split(ShardKey::from_i32(50)).unwrap();
        assert_eq!(left.low().to_i32(), Some(0));
        assert_eq!(left.high().to_i32(), Some(50));
        assert_eq!(right.low().to_i32(), Some(50));
        assert_eq!(right.high().to_i32(), Some(100));
    }

    #[test]
    fn test_split_at_boundary_rejected() {
        let r = range(0, 100);
        assert!(r.split(ShardKey::from_i32(0)).is_err());
        assert!(r.split(ShardKey::from_i32(100)).is_err());
    }

    #[test]
    fn test_merge_contiguous() {
        let a = range(0, 50);
        let b = range(50, 100);
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.low().to_i32(), Some(0));
        assert_eq!(merged.high().to_i32(), Some(100));
    }

    #[test]
    fn test_merge_non_contiguous_rejected() {
        let a = range(0, 40);
        let b = range(50, 100);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_full_range_upper_is_max() {
        let r = ShardRange::full(ShardKeyType::Int32, ShardKey::from_i32(i32::MIN)).unwrap();
        assert!(r.high().is_max());
        assert!(r.contains(&ShardKey::from_i32(i32::MAX)).unwrap());
    }
}
