use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::ShardKeyType;

/// What a shard map's mappings look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardMapKind {
    /// Single-key-to-shard mappings.
    List,
    /// Contiguous-range-to-shard mappings.
    Range,
    /// No mappings; used only for multi-shard fan-out (`GetShards()`).
    Default,
}

/// A named collection of shards and (for list/range maps) mappings
/// (spec.md §3 `ShardMap`). Modeled as one concrete struct tagged by
/// `kind`/`key_kind` rather than a generic `ShardMap<T>` (spec.md §9): the
/// typed views in [`crate::mapper`] encode/decode keys through
/// [`crate::key`] instead of requiring monomorphized storage per key
/// type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardMap {
    pub id: Uuid,
    pub name: String,
    pub kind: ShardMapKind,
    pub key_kind: ShardKeyType,
}

impl ShardMap {
    pub fn new(name: impl Into<String>, kind: ShardMapKind, key_kind: ShardKeyType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            key_kind,
        }
    }
}
