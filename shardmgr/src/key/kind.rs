use serde::{Deserialize, Serialize};

/// The type tag of a [`crate::key::ShardKey`]. A shard map is keyed by
/// exactly one of these for its entire lifetime (spec.md §3, `ShardMap`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardKeyType {
    Int32,
    Int64,
    Guid,
    Bytes,
    DateTime,
    DateTimeOffset,
    TimeSpan,
}

impl ShardKeyType {
    /// Width in bytes of the canonical encoding of a finite key of this
    /// kind, where fixed. `Bytes` keys are variable-length.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Int32 => Some(4),
            Self::Int64 => Some(8),
            Self::Guid => Some(16),
            Self::Bytes => None,
            Self::DateTime => Some(8),
            Self::DateTimeOffset => Some(8),
            Self::TimeSpan => Some(8),
        }
    }
}
