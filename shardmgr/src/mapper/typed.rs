//! Typed views over [`ShardMap`] (spec.md §4.F, redesign note in §9):
//! rather than a generic `ShardMap<T>`, the underlying entity stays one
//! concrete struct carrying a `ShardMapKind`/`ShardKeyType` tag, and
//! these wrappers are thin parametric views that check the tag once at
//! construction and expose only the operations valid for that kind.

use std::sync::Arc;

use crate::entities::{LockOwnerId, Mapping, Shard, ShardLocation, ShardMap, ShardMapConversionError, ShardMapKind};
use crate::key::{ShardKey, ShardRange};

use super::{ensure_kind, Mapper, MapperError};

/// `ShardMapKind::List` view: point mappings only.
pub struct ListShardMap {
    shard_map: ShardMap,
    mapper: Arc<Mapper>,
}

impl ListShardMap {
    pub fn try_new(shard_map: ShardMap, mapper: Arc<Mapper>) -> Result<Self, ShardMapConversionError> {
        ensure_kind(&shard_map, ShardMapKind::List).map_err(expect_conversion)?;
        Ok(Self { shard_map, mapper })
    }

    pub fn shard_map(&self) -> &ShardMap {
        &self.shard_map
    }

    pub async fn create_shard(&self, location: ShardLocation) -> Result<Shard, MapperError> {
        self.mapper.create_shard(&self.shard_map, location).await
    }

    pub async fn delete_shard(&self, shard: &Shard) -> Result<(), MapperError> {
        self.mapper.delete_shard(shard).await
    }

    pub async fn get_shards(&self) -> Result<Vec<Shard>, MapperError> {
        self.mapper.get_shards(&self.shard_map).await
    }

    pub async fn create_point_mapping(&self, shard: &Shard, key: ShardKey) -> Result<Mapping, MapperError> {
        self.mapper.create_point_mapping(&self.shard_map, shard, key).await
    }

    pub async fn delete_mapping(&self, mapping: &Mapping, lock_owner_id: LockOwnerId) -> Result<(), MapperError> {
        self.mapper.delete_mapping(&self.shard_map, mapping, lock_owner_id).await
    }

    pub async fn get_mapping_for_key(&self, key: &ShardKey, validate: bool) -> Result<(Mapping, Shard), MapperError> {
        self.mapper.find_shard_mapping_by_key(&self.shard_map, key, validate).await
    }

    pub async fn get_mappings(&self, shard: Option<&Shard>) -> Result<Vec<Mapping>, MapperError> {
        self.mapper.get_mappings(&self.shard_map, None, shard).await
    }

    pub async fn lock_mapping(&self, mapping: &Mapping, owner: LockOwnerId) -> Result<Mapping, MapperError> {
        self.mapper.lock_mapping(&self.shard_map, mapping, owner).await
    }

    pub async fn unlock_mapping(&self, mapping: &Mapping, owner: LockOwnerId) -> Result<Mapping, MapperError> {
        self.mapper.unlock_mapping(&self.shard_map, mapping, owner).await
    }
}

/// `ShardMapKind::Range` view: range mappings, plus split/merge.
pub struct RangeShardMap {
    shard_map: ShardMap,
    mapper: Arc<Mapper>,
}

impl RangeShardMap {
    pub fn try_new(shard_map: ShardMap, mapper: Arc<Mapper>) -> Result<Self, ShardMapConversionError> {
        ensure_kind(&shard_map, ShardMapKind::Range).map_err(expect_conversion)?;
        Ok(Self { shard_map, mapper })
    }

    pub fn shard_map(&self) -> &ShardMap {
        &self.shard_map
    }

    pub async fn create_shard(&self, location: ShardLocation) -> Result<Shard, MapperError> {
        self.mapper.create_shard(&self.shard_map, location).await
    }

    pub async fn delete_shard(&self, shard: &Shard) -> Result<(), MapperError> {
        self.mapper.delete_shard(shard).await
    }

    pub async fn get_shards(&self) -> Result<Vec<Shard>, MapperError> {
        self.mapper.get_shards(&self.shard_map).await
    }

    pub async fn create_range_mapping(&self, shard: &Shard, range: ShardRange) -> Result<Mapping, MapperError> {
        self.mapper.create_range_mapping(&self.shard_map, shard, range).await
    }

    pub async fn delete_mapping(&self, mapping: &Mapping, lock_owner_id: LockOwnerId) -> Result<(), MapperError> {
        self.mapper.delete_mapping(&self.shard_map, mapping, lock_owner_id).await
    }

    pub async fn get_mapping_for_key(&self, key: &ShardKey, validate: bool) -> Result<(Mapping, Shard), MapperError> {
        self.mapper.find_shard_mapping_by_key(&self.shard_map, key, validate).await
    }

    pub async fn get_mappings(&self, range: Option<&ShardRange>, shard: Option<&Shard>) -> Result<Vec<Mapping>, MapperError> {
        self.mapper.get_mappings(&self.shard_map, range, shard).await
    }

    pub async fn split_mapping(&self, mapping: &Mapping, at: ShardKey) -> Result<(Mapping, Mapping), MapperError> {
        self.mapper.split_mapping(&self.shard_map, mapping, at).await
    }

    pub async fn merge_mappings(&self, left: &Mapping, right: &Mapping) -> Result<Mapping, MapperError> {
        self.mapper.merge_mappings(&self.shard_map, left, right).await
    }

    pub async fn lock_mapping(&self, mapping: &Mapping, owner: LockOwnerId) -> Result<Mapping, MapperError> {
        self.mapper.lock_mapping(&self.shard_map, mapping, owner).await
    }

    pub async fn unlock_mapping(&self, mapping: &Mapping, owner: LockOwnerId) -> Result<Mapping, MapperError> {
        self.mapper.unlock_mapping(&self.shard_map, mapping, owner).await
    }
}

/// `ShardMapKind::Default` view: no mapping surface, only shard
/// membership (spec.md §4.F — "Default variant exposes only
/// GetShards/CreateShard/DeleteShard").
pub struct DefaultShardMap {
    shard_map: ShardMap,
    mapper: Arc<Mapper>,
}

impl DefaultShardMap {
    pub fn try_new(shard_map: ShardMap, mapper: Arc<Mapper>) -> Result<Self, ShardMapConversionError> {
        ensure_kind(&shard_map, ShardMapKind::Default).map_err(expect_conversion)?;
        Ok(Self { shard_map, mapper })
    }

    pub fn shard_map(&self) -> &ShardMap {
        &self.shard_map
    }

    pub async fn create_shard(&self, location: ShardLocation) -> Result<Shard, MapperError> {
        self.mapper.create_shard(&self.shard_map, location).await
    }

    pub async fn delete_shard(&self, shard: &Shard) -> Result<(), MapperError> {
        self.mapper.delete_shard(shard).await
    }

    pub async fn get_shards(&self) -> Result<Vec<Shard>, MapperError> {
        self.mapper.get_shards(&self.shard_map).await
    }
}

/// `ensure_kind` only ever returns the `Conversion` variant; the typed
/// views surface that directly instead of the broader `MapperError`.
fn expect_conversion(err: MapperError) -> ShardMapConversionError {
    match err {
        MapperError::Conversion(inner) => inner,
        other => unreachable!("ensure_kind only raises Conversion errors, got {other:?}"),
    }
}
