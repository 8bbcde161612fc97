use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::{ShardKey, ShardKeyType, ShardRange};

use super::lock_owner::LockOwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingStatus {
    Online,
    Offline,
}

/// Either a single point (list map) or a half-open range (range map). A
/// mapping holds exactly one, never both (spec.md §3 `Mapping`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingKey {
    Point(ShardKey),
    Range(ShardRange),
}

impl MappingKey {
    pub fn kind(&self) -> ShardKeyType {
        match self {
            Self::Point(key) => key.kind(),
            Self::Range(range) => range.kind(),
        }
    }

    pub fn min_value(&self) -> &ShardKey {
        match self {
            Self::Point(key) => key,
            Self::Range(range) => range.low(),
        }
    }

    pub fn as_range(&self) -> Option<&ShardRange> {
        match self {
            Self::Range(range) => Some(range),
            Self::Point(_) => None,
        }
    }

    pub fn as_point(&self) -> Option<&ShardKey> {
        match self {
            Self::Point(key) => Some(key),
            Self::Range(_) => None,
        }
    }
}

/// An association from a point or range of keys to a shard (spec.md §3
/// `Mapping`). `readable` mirrors the GSM `Readable` column (spec.md §6):
/// a mapping under a pending two-phase operation is invisible to routing
/// lookups until the operation commits.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub id: Uuid,
    pub shard_map_id: Uuid,
    pub shard_id: Uuid,
    pub key: MappingKey,
    pub status: MappingStatus,
    pub lock_owner_id: LockOwnerId,
    pub readable: bool,
    pub operation_id: Option<Uuid>,
}

impl Mapping {
    pub fn new_point(shard_map_id: Uuid, shard_id: Uuid, key: ShardKey) -> Self {
        Self::new(shard_map_id, shard_id, MappingKey::Point(key))
    }

    pub fn new_range(shard_map_id: Uuid, shard_id: Uuid, range: ShardRange) -> Self {
        Self::new(shard_map_id, shard_id, MappingKey::Range(range))
    }

    fn new(shard_map_id: Uuid, shard_id: Uuid, key: MappingKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            shard_map_id,
            shard_id,
            key,
            status: MappingStatus::Online,
            lock_owner_id: LockOwnerId::NONE,
            readable: true,
            operation_id: None,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self.status, MappingStatus::Online)
    }

    /// A row is visible to a routing lookup only when it is both readable
    /// (no pending operation holds it) and online (spec.md §3 invariant 4
    /// and 6).
    pub fn is_routable(&self) -> bool {
        self.readable && self.is_online()
    }
}
