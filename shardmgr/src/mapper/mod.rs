//! Ties the cache, the GSM connection, the operation engine, and a pool
//! of LSM connections together into the routing/CRUD/split/merge/lock
//! surface a typed shard map exposes (spec.md §4.G).

mod connector;
mod error;
mod typed;

use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::cache::Cache;
use crate::entities::{
    LockOwnerId, Mapping, MappingKey, MappingStatus, Shard, ShardLocation, ShardMap,
    ShardMapConversionError, ShardMapKind, ShardStatus,
};
use crate::key::{ShardKey, ShardKeyType, ShardRange};
use crate::operation::{OperationCode, OperationContext, OperationEngine, OperationSteps};
use crate::store::{
    BulkStep, BulkStepKind, LockScope, MappingEntity, Payload, ResultCode, ShardBulkStep,
    ShardEntity, ShardMapEntity, StoreConnection, StoreError, StoredProcedure, TransactionKind,
};

pub use connector::{FakeLsmConnector, LsmConnector, PgLsmConnector};
pub use error::MapperError;
pub use typed::{DefaultShardMap, ListShardMap, RangeShardMap};

/// Holds one GSM connection, the process-wide cache, the step-table
/// operation engine, and whatever dials out to each shard's LSM. Cheap
/// to clone-by-`Arc`; a `ShardMapManager` hands out one per typed view.
pub struct Mapper {
    gsm: StoreConnection,
    cache: Arc<Cache>,
    connector: Arc<dyn LsmConnector>,
    engine: OperationEngine,
}

impl Mapper {
    pub fn new(gsm: StoreConnection, cache: Arc<Cache>, connector: Arc<dyn LsmConnector>) -> Self {
        Self {
            gsm,
            cache,
            connector,
            engine: OperationEngine::new(),
        }
    }

    pub async fn create_shard_map(
        &self,
        name: impl Into<String>,
        kind: ShardMapKind,
        key_kind: ShardKeyType,
    ) -> Result<ShardMap, MapperError> {
        let shard_map = ShardMap::new(name, kind, key_kind);
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::AddShardMapGlobal,
                Payload {
                    shard_map: Some(shard_map_entity(&shard_map)),
                    ..Payload::empty()
                },
            )
            .await?;
        if !result.is_success() {
            return Err(MapperError::Store(StoreError::semantic(result.code)));
        }
        self.cache.put_shard_map(shard_map.clone());
        Ok(shard_map)
    }

    #[instrument(skip(self))]
    pub async fn get_shard_map(&self, name: &str) -> Result<ShardMap, MapperError> {
        if let Some(shard_map) = self.cache.get_shard_map(name) {
            debug!("shard map cache hit");
            return Ok(shard_map);
        }
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::FindShardMapByNameGlobal,
                Payload {
                    shard_map_name: Some(name.to_string()),
                    ..Payload::empty()
                },
            )
            .await?;
        if !result.is_success() {
            return Err(MapperError::ShardMapNotFound(name.to_string()));
        }
        let shard_map = result
            .results
            .shard_maps
            .into_iter()
            .next()
            .ok_or_else(|| MapperError::ShardMapNotFound(name.to_string()))?;
        self.cache.put_shard_map(shard_map.clone());
        Ok(shard_map)
    }

    /// Every shard map known to the GSM, used by eager manager load
    /// (spec.md §4.I) to preload the cache in one pass.
    pub async fn list_shard_maps(&self) -> Result<Vec<ShardMap>, MapperError> {
        let result = self
            .gsm
            .execute(TransactionKind::Global, StoredProcedure::GetShardMapsGlobal, Payload::empty())
            .await?;
        for shard_map in &result.results.shard_maps {
            self.cache.put_shard_map(shard_map.clone());
        }
        Ok(result.results.shard_maps)
    }

    /// Eager manager load (spec.md §4.I): pull every shard map and its
    /// full mapping set into the cache in one pass, so the first routing
    /// call never has to fall back to GSM.
    #[instrument(skip(self))]
    pub async fn preload_all(&self) -> Result<(), MapperError> {
        for shard_map in self.list_shard_maps().await? {
            for mapping in self.get_mappings(&shard_map, None, None).await? {
                self.cache.put_mapping(shard_map.id, mapping);
            }
        }
        Ok(())
    }

    pub async fn delete_shard_map(&self, shard_map: &ShardMap) -> Result<(), MapperError> {
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::RemoveShardMapGlobal,
                Payload {
                    shard_map: Some(shard_map_entity(shard_map)),
                    ..Payload::empty()
                },
            )
            .await?;
        if !result.is_success() {
            return Err(MapperError::Store(StoreError::semantic(result.code)));
        }
        self.cache.evict_shard_map(&shard_map.name);
        Ok(())
    }

    pub async fn get_shards(&self, shard_map: &ShardMap) -> Result<Vec<Shard>, MapperError> {
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::GetShardsGlobal,
                Payload {
                    shard: Some(shard_map_filter(shard_map.id)),
                    ..Payload::empty()
                },
            )
            .await?;
        Ok(result.results.shards)
    }

    pub async fn create_shard(&self, shard_map: &ShardMap, location: ShardLocation) -> Result<Shard, MapperError> {
        let shard = Shard::new(shard_map.id, location);
        let entity = shard_entity(&shard);
        let forward = vec![ShardBulkStep {
            id: 0,
            kind: BulkStepKind::Add,
            shard: entity.clone(),
        }];
        let undo = vec![ShardBulkStep {
            id: 0,
            kind: BulkStepKind::Remove,
            shard: entity,
        }];
        let ctx = OperationContext {
            op_id: Uuid::new_v4(),
            code: OperationCode::AddShard,
            gsm: self.gsm.clone(),
            lsm_source: None,
            lsm_target: None,
            steps: OperationSteps::Shard { forward, undo },
        };
        self.engine.run(ctx).await?;
        Ok(shard)
    }

    pub async fn delete_shard(&self, shard: &Shard) -> Result<(), MapperError> {
        let entity = shard_entity(shard);
        let forward = vec![ShardBulkStep {
            id: 0,
            kind: BulkStepKind::Remove,
            shard: entity.clone(),
        }];
        let undo = vec![ShardBulkStep {
            id: 0,
            kind: BulkStepKind::Add,
            shard: entity,
        }];
        let ctx = OperationContext {
            op_id: Uuid::new_v4(),
            code: OperationCode::RemoveShard,
            gsm: self.gsm.clone(),
            lsm_source: None,
            lsm_target: None,
            steps: OperationSteps::Shard { forward, undo },
        };
        self.engine.run(ctx).await?;
        self.cache.evict_shard(shard.shard_map_id, shard.id);
        Ok(())
    }

    /// The routing algorithm (spec.md §4.G): cache probe, GSM fallback on
    /// miss, optional LSM validation of a cache hit before trusting it.
    #[instrument(skip(self, shard_map))]
    pub async fn find_shard_mapping_by_key(
        &self,
        shard_map: &ShardMap,
        key: &ShardKey,
        validate: bool,
    ) -> Result<(Mapping, Shard), MapperError> {
        if let Some(mapping) = self.cache.get_mapping_for_key(shard_map.id, key) {
            let shard = self.shard_by_id(shard_map.id, mapping.shard_id).await?;
            if !validate {
                return Ok((mapping, shard));
            }
            match self.validate_mapping(&mapping, &shard).await {
                Ok(()) => return Ok((mapping, shard)),
                Err(MapperError::ValidationFailed { .. }) => {
                    debug!(mapping_id = %mapping.id, "cached mapping failed LSM validation, refreshing from GSM");
                    self.cache.evict_mapping(shard_map.id, mapping.id);
                }
                Err(MapperError::Store(store_err)) => {
                    self.cache.invalidate_on_error(&store_err, shard_map.id, Some(mapping.id));
                    return Err(MapperError::Store(store_err));
                }
                Err(other) => return Err(other),
            }
        }

        let bytes = key
            .canonical_bytes()
            .ok_or_else(|| MapperError::NoMappingForKey {
                shard_map: shard_map.name.clone(),
            })?;
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::FindMappingByKeyGlobal,
                Payload {
                    key: Some(bytes.to_vec()),
                    ..Payload::empty()
                },
            )
            .await?;
        if !result.is_success() {
            return Err(MapperError::NoMappingForKey {
                shard_map: shard_map.name.clone(),
            });
        }
        let mapping = result
            .results
            .mappings
            .into_iter()
            .next()
            .ok_or_else(|| MapperError::NoMappingForKey {
                shard_map: shard_map.name.clone(),
            })?;
        let shard = self.shard_by_id(shard_map.id, mapping.shard_id).await?;

        if validate {
            self.validate_mapping(&mapping, &shard).await?;
        }

        self.cache.put_mapping(shard_map.id, mapping.clone());
        Ok((mapping, shard))
    }

    async fn validate_mapping(&self, mapping: &Mapping, shard: &Shard) -> Result<(), MapperError> {
        let lsm = self.lsm_for(&shard.location).await?;
        let result = lsm
            .execute(
                TransactionKind::LocalSource,
                StoredProcedure::ValidateMappingLocal,
                Payload {
                    mapping: Some(mapping_entity(mapping)),
                    ..Payload::empty()
                },
            )
            .await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(MapperError::ValidationFailed {
                mapping_id: mapping.id,
                code: result.code,
            })
        }
    }

    /// There is no `FindShardByIdGlobal` procedure (spec.md §6 names only
    /// `FindShardByLocationGlobal` and `GetAllShardsGlobal`): a by-id
    /// lookup goes through the shard list for the owning shard map.
    async fn shard_by_id(&self, shard_map_id: Uuid, shard_id: Uuid) -> Result<Shard, MapperError> {
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::GetShardsGlobal,
                Payload {
                    shard: Some(shard_map_filter(shard_map_id)),
                    ..Payload::empty()
                },
            )
            .await?;
        result
            .results
            .shards
            .into_iter()
            .find(|s| s.id == shard_id)
            .ok_or_else(|| MapperError::Store(StoreError::semantic(ResultCode::ShardDoesNotExist)))
    }

    async fn lsm_for(&self, location: &ShardLocation) -> Result<StoreConnection, MapperError> {
        Ok(self.connector.connect(location).await?)
    }

    pub async fn create_point_mapping(
        &self,
        shard_map: &ShardMap,
        shard: &Shard,
        key: ShardKey,
    ) -> Result<Mapping, MapperError> {
        ensure_kind(shard_map, ShardMapKind::List)?;
        let mapping = Mapping::new_point(shard_map.id, shard.id, key);
        self.add_mapping(shard_map, shard, &mapping).await?;
        Ok(mapping)
    }

    pub async fn create_range_mapping(
        &self,
        shard_map: &ShardMap,
        shard: &Shard,
        range: ShardRange,
    ) -> Result<Mapping, MapperError> {
        ensure_kind(shard_map, ShardMapKind::Range)?;
        let mapping = Mapping::new_range(shard_map.id, shard.id, range);
        self.add_mapping(shard_map, shard, &mapping).await?;
        Ok(mapping)
    }

    async fn add_mapping(&self, shard_map: &ShardMap, shard: &Shard, mapping: &Mapping) -> Result<(), MapperError> {
        let entity = mapping_entity(mapping);
        let forward = vec![BulkStep {
            id: 0,
            kind: BulkStepKind::Add,
            mapping: entity.clone(),
        }];
        let undo = vec![BulkStep {
            id: 0,
            kind: BulkStepKind::Remove,
            mapping: entity,
        }];
        let lsm = self.lsm_for(&shard.location).await?;
        let ctx = OperationContext {
            op_id: Uuid::new_v4(),
            code: OperationCode::AddMapping,
            gsm: self.gsm.clone(),
            lsm_source: Some(lsm),
            lsm_target: None,
            steps: OperationSteps::Mapping { forward, undo },
        };
        self.engine.run(ctx).await?;
        self.cache.put_mapping(shard_map.id, mapping.clone());
        Ok(())
    }

    pub async fn delete_mapping(
        &self,
        shard_map: &ShardMap,
        mapping: &Mapping,
        lock_owner_id: LockOwnerId,
    ) -> Result<(), MapperError> {
        let shard = self.shard_by_id(shard_map.id, mapping.shard_id).await?;
        let entity = mapping_entity(mapping);
        let forward = vec![BulkStep {
            id: 0,
            kind: BulkStepKind::Remove,
            mapping: with_lock_owner(entity.clone(), lock_owner_id),
        }];
        let undo = vec![BulkStep {
            id: 0,
            kind: BulkStepKind::Add,
            mapping: entity,
        }];
        let lsm = self.lsm_for(&shard.location).await?;
        let ctx = OperationContext {
            op_id: Uuid::new_v4(),
            code: OperationCode::RemoveMapping,
            gsm: self.gsm.clone(),
            lsm_source: Some(lsm),
            lsm_target: None,
            steps: OperationSteps::Mapping { forward, undo },
        };
        self.engine.run(ctx).await?;
        self.cache.evict_mapping(shard_map.id, mapping.id);
        Ok(())
    }

    pub async fn update_mapping_status(
        &self,
        shard_map: &ShardMap,
        mapping: &Mapping,
        status: MappingStatus,
        lock_owner_id: LockOwnerId,
    ) -> Result<Mapping, MapperError> {
        let shard = self.shard_by_id(shard_map.id, mapping.shard_id).await?;
        let old_entity = mapping_entity(mapping);
        let mut new_entity = old_entity.clone();
        new_entity.status = status;
        new_entity.lock_owner_id = lock_owner_id;

        let forward = vec![BulkStep {
            id: 0,
            kind: BulkStepKind::Update,
            mapping: new_entity,
        }];
        let undo = vec![BulkStep {
            id: 0,
            kind: BulkStepKind::Update,
            mapping: with_lock_owner(old_entity, lock_owner_id),
        }];

        let lsm = self.lsm_for(&shard.location).await?;
        let ctx = OperationContext {
            op_id: Uuid::new_v4(),
            code: OperationCode::UpdateMapping,
            gsm: self.gsm.clone(),
            lsm_source: Some(lsm),
            lsm_target: None,
            steps: OperationSteps::Mapping { forward, undo },
        };
        self.engine.run(ctx).await?;

        let mut updated = mapping.clone();
        updated.status = status;
        updated.lock_owner_id = lock_owner_id;
        self.cache.put_mapping(shard_map.id, updated.clone());
        Ok(updated)
    }

    /// `[a,c)` at split key `b` becomes `[a,b)` and `[b,c)`, one bulk
    /// step, both halves staying on `mapping`'s current shard (spec.md
    /// §4.G).
    #[instrument(skip(self, shard_map))]
    pub async fn split_mapping(
        &self,
        shard_map: &ShardMap,
        mapping: &Mapping,
        at: ShardKey,
    ) -> Result<(Mapping, Mapping), MapperError> {
        let range = mapping.key.as_range().ok_or_else(|| range_kind_mismatch(shard_map))?;
        let (left_range, right_range) = range.split(at)?;

        let shard = self.shard_by_id(shard_map.id, mapping.shard_id).await?;
        let left = Mapping::new_range(shard_map.id, shard.id, left_range);
        let right = Mapping::new_range(shard_map.id, shard.id, right_range);

        let remove_entity = mapping_entity(mapping);
        let left_entity = mapping_entity(&left);
        let right_entity = mapping_entity(&right);

        let forward = vec![
            BulkStep {
                id: 0,
                kind: BulkStepKind::Remove,
                mapping: remove_entity.clone(),
            },
            BulkStep {
                id: 1,
                kind: BulkStepKind::Add,
                mapping: left_entity.clone(),
            },
            BulkStep {
                id: 2,
                kind: BulkStepKind::Add,
                mapping: right_entity.clone(),
            },
        ];
        let undo = vec![
            BulkStep {
                id: 0,
                kind: BulkStepKind::Remove,
                mapping: left_entity,
            },
            BulkStep {
                id: 1,
                kind: BulkStepKind::Remove,
                mapping: right_entity,
            },
            BulkStep {
                id: 2,
                kind: BulkStepKind::Add,
                mapping: remove_entity,
            },
        ];

        let lsm = self.lsm_for(&shard.location).await?;
        let ctx = OperationContext {
            op_id: Uuid::new_v4(),
            code: OperationCode::SplitMapping,
            gsm: self.gsm.clone(),
            lsm_source: Some(lsm),
            lsm_target: None,
            steps: OperationSteps::Mapping { forward, undo },
        };
        self.engine.run(ctx).await?;

        self.cache.evict_mapping(shard_map.id, mapping.id);
        self.cache.put_mapping(shard_map.id, left.clone());
        self.cache.put_mapping(shard_map.id, right.clone());
        debug!(left = %left.id, right = %right.id, "split committed");
        Ok((left, right))
    }

    /// Two contiguous mappings `[a,b)`,`[b,c)` on the same shard become
    /// `[a,c)` (spec.md §4.G).
    pub async fn merge_mappings(
        &self,
        shard_map: &ShardMap,
        left: &Mapping,
        right: &Mapping,
    ) -> Result<Mapping, MapperError> {
        let left_range = left.key.as_range().ok_or_else(|| range_kind_mismatch(shard_map))?;
        let right_range = right.key.as_range().ok_or_else(|| range_kind_mismatch(shard_map))?;
        if left.shard_id != right.shard_id {
            return Err(MapperError::MappingsNotOnSameShard {
                left: left.id,
                right: right.id,
            });
        }
        let merged_range = left_range.merge(right_range)?;

        let shard = self.shard_by_id(shard_map.id, left.shard_id).await?;
        let merged = Mapping::new_range(shard_map.id, shard.id, merged_range);

        let left_entity = mapping_entity(left);
        let right_entity = mapping_entity(right);
        let merged_entity = mapping_entity(&merged);

        let forward = vec![
            BulkStep {
                id: 0,
                kind: BulkStepKind::Remove,
                mapping: left_entity.clone(),
            },
            BulkStep {
                id: 1,
                kind: BulkStepKind::Remove,
                mapping: right_entity.clone(),
            },
            BulkStep {
                id: 2,
                kind: BulkStepKind::Add,
                mapping: merged_entity.clone(),
            },
        ];
        let undo = vec![
            BulkStep {
                id: 0,
                kind: BulkStepKind::Remove,
                mapping: merged_entity,
            },
            BulkStep {
                id: 1,
                kind: BulkStepKind::Add,
                mapping: left_entity,
            },
            BulkStep {
                id: 2,
                kind: BulkStepKind::Add,
                mapping: right_entity,
            },
        ];

        let lsm = self.lsm_for(&shard.location).await?;
        let ctx = OperationContext {
            op_id: Uuid::new_v4(),
            code: OperationCode::MergeMapping,
            gsm: self.gsm.clone(),
            lsm_source: Some(lsm),
            lsm_target: None,
            steps: OperationSteps::Mapping { forward, undo },
        };
        self.engine.run(ctx).await?;

        self.cache.evict_mapping(shard_map.id, left.id);
        self.cache.evict_mapping(shard_map.id, right.id);
        self.cache.put_mapping(shard_map.id, merged.clone());
        Ok(merged)
    }

    async fn lock_or_unlock_one(
        &self,
        mapping: &Mapping,
        presented: LockOwnerId,
        new_owner: LockOwnerId,
    ) -> Result<(), MapperError> {
        let mut entity = mapping_entity(mapping);
        entity.lock_owner_id = new_owner;
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::LockOrUnlockMappingsGlobal,
                Payload {
                    mapping: Some(entity),
                    lock_owner_id: Some(presented),
                    lock_scope: Some(LockScope::One),
                    ..Payload::empty()
                },
            )
            .await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(MapperError::Store(StoreError::semantic(result.code)))
        }
    }

    pub async fn lock_mapping(&self, shard_map: &ShardMap, mapping: &Mapping, owner: LockOwnerId) -> Result<Mapping, MapperError> {
        self.lock_or_unlock_one(mapping, LockOwnerId::NONE, owner).await?;
        let mut updated = mapping.clone();
        updated.lock_owner_id = owner;
        self.cache.put_mapping(shard_map.id, updated.clone());
        Ok(updated)
    }

    pub async fn unlock_mapping(&self, shard_map: &ShardMap, mapping: &Mapping, owner: LockOwnerId) -> Result<Mapping, MapperError> {
        self.lock_or_unlock_one(mapping, owner, LockOwnerId::NONE).await?;
        let mut updated = mapping.clone();
        updated.lock_owner_id = LockOwnerId::NONE;
        self.cache.put_mapping(shard_map.id, updated.clone());
        Ok(updated)
    }

    /// Unlocks every mapping `owner` currently holds, across every shard
    /// map — used when an application instance releases all its locks on
    /// shutdown (spec.md §4.E "Lock protocol"). Does not touch the
    /// cache: callers that care about a specific mapping's lock state
    /// should re-fetch it.
    pub async fn unlock_all_for_owner(&self, owner: LockOwnerId) -> Result<(), MapperError> {
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::LockOrUnlockMappingsGlobal,
                Payload {
                    lock_owner_id: Some(owner),
                    lock_scope: Some(LockScope::AllForOwner),
                    ..Payload::empty()
                },
            )
            .await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(MapperError::Store(StoreError::semantic(result.code)))
        }
    }

    /// Range queries over mappings accept an optional range and an
    /// optional shard filter, both half-open (spec.md §4.G). The store
    /// only filters by shard map; the range/shard narrowing happens
    /// client-side.
    pub async fn get_mappings(
        &self,
        shard_map: &ShardMap,
        range: Option<&ShardRange>,
        shard: Option<&Shard>,
    ) -> Result<Vec<Mapping>, MapperError> {
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::GetAllMappingsGlobal,
                Payload {
                    shard: Some(shard_map_filter(shard_map.id)),
                    ..Payload::empty()
                },
            )
            .await?;

        Ok(result
            .results
            .mappings
            .into_iter()
            .filter(|m| shard.map_or(true, |s| m.shard_id == s.id))
            .filter(|m| match range {
                None => true,
                Some(r) => match &m.key {
                    MappingKey::Point(k) => r.contains(k).unwrap_or(false),
                    MappingKey::Range(mr) => r.intersects(mr).unwrap_or(false),
                },
            })
            .collect())
    }
}

fn ensure_kind(shard_map: &ShardMap, expected: ShardMapKind) -> Result<(), MapperError> {
    if shard_map.kind == expected {
        Ok(())
    } else {
        Err(ShardMapConversionError::KindMismatch {
            name: shard_map.name.clone(),
            expected,
            actual: shard_map.kind,
        }
        .into())
    }
}

fn range_kind_mismatch(shard_map: &ShardMap) -> MapperError {
    ShardMapConversionError::KindMismatch {
        name: shard_map.name.clone(),
        expected: ShardMapKind::Range,
        actual: shard_map.kind,
    }
    .into()
}

pub(crate) fn shard_map_entity(shard_map: &ShardMap) -> ShardMapEntity {
    ShardMapEntity {
        id: shard_map.id,
        name: shard_map.name.clone(),
        kind: shard_map.kind,
        key_kind: shard_map.key_kind,
    }
}

pub(crate) fn shard_entity(shard: &Shard) -> ShardEntity {
    ShardEntity {
        id: shard.id,
        shard_map_id: shard.shard_map_id,
        version: shard.version,
        location: shard.location.clone(),
        status: shard.status,
    }
}

/// A `ShardEntity` carrying only the fields `GetShardsGlobal`'s filter
/// reads (`shard_map_id`); the rest are placeholders, never inspected.
pub(crate) fn shard_map_filter(shard_map_id: Uuid) -> ShardEntity {
    ShardEntity {
        id: Uuid::nil(),
        shard_map_id,
        version: Uuid::nil(),
        location: ShardLocation::new("", 0, ""),
        status: ShardStatus::Online,
    }
}

pub(crate) fn mapping_entity(mapping: &Mapping) -> MappingEntity {
    let min_value = mapping
        .key
        .min_value()
        .canonical_bytes()
        .expect("a mapping's min value is always finite")
        .to_vec();
    let max_value = match &mapping.key {
        MappingKey::Point(_) => None,
        MappingKey::Range(range) => Some(range.high().canonical_bytes().map(|b| b.to_vec())),
    };
    MappingEntity {
        id: mapping.id,
        shard_map_id: mapping.shard_map_id,
        shard_id: mapping.shard_id,
        key_kind: mapping.key.kind(),
        min_value,
        max_value,
        status: mapping.status,
        lock_owner_id: mapping.lock_owner_id,
    }
}

fn with_lock_owner(entity: MappingEntity, lock_owner_id: LockOwnerId) -> MappingEntity {
    MappingEntity { lock_owner_id, ..entity }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::key::ShardKeyType;
    use crate::store::FakeStore;
    use shardmgr_config::StoreVersion;

    fn store() -> Arc<FakeStore> {
        Arc::new(FakeStore::new(StoreVersion::ZERO))
    }

    fn mapper(gsm: Arc<FakeStore>, connector: Arc<FakeLsmConnector>) -> Mapper {
        Mapper::new(StoreConnection::new(gsm), Arc::new(Cache::new()), connector)
    }

    async fn setup_s1() -> (Mapper, ShardMap, Shard, Mapping) {
        let gsm = store();
        let connector = Arc::new(FakeLsmConnector::new());
        let lsm = store();
        let location = ShardLocation::new("srv-a", 5432, "db0");
        connector.register(location.clone(), lsm as Arc<dyn crate::store::Store>);

        let mapper = mapper(gsm, connector);
        let shard_map = mapper
            .create_shard_map("CustomerIDShardMap", ShardMapKind::Range, ShardKeyType::Int32)
            .await
            .unwrap();
        let shard = mapper.create_shard(&shard_map, location).await.unwrap();
        let range = ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(100)).unwrap();
        let mapping = mapper.create_range_mapping(&shard_map, &shard, range).await.unwrap();
        (mapper, shard_map, shard, mapping)
    }

    #[tokio::test]
    async fn test_s1_create_range_map_and_mapping() {
        let (mapper, shard_map, shard, mapping) = setup_s1().await;
        let (found, found_shard) = mapper
            .find_shard_mapping_by_key(&shard_map, &ShardKey::from_i32(42), false)
            .await
            .unwrap();
        assert_eq!(found.id, mapping.id);
        assert_eq!(found_shard.id, shard.id);
        assert_eq!(found.key.as_range().unwrap().low().to_i32(), Some(0));
        assert_eq!(found.key.as_range().unwrap().high().to_i32(), Some(100));
    }

    #[tokio::test]
    async fn test_s2_split() {
        let (mapper, shard_map, shard, mapping) = setup_s1().await;
        let (left, right) = mapper.split_mapping(&shard_map, &mapping, ShardKey::from_i32(50)).await.unwrap();

        assert_ne!(left.id, mapping.id);
        assert_ne!(right.id, mapping.id);
        assert_eq!(left.shard_id, shard.id);
        assert_eq!(right.shard_id, shard.id);
        assert_eq!(left.key.as_range().unwrap().high().to_i32(), Some(50));
        assert_eq!(right.key.as_range().unwrap().low().to_i32(), Some(50));

        let (found, _) = mapper
            .find_shard_mapping_by_key(&shard_map, &ShardKey::from_i32(42), false)
            .await
            .unwrap();
        assert_eq!(found.id, left.id);
    }

    #[tokio::test]
    async fn test_s3_lock_and_update() {
        let (mapper, shard_map, _, mapping) = setup_s1().await;
        let (left, _) = mapper.split_mapping(&shard_map, &mapping, ShardKey::from_i32(50)).await.unwrap();

        let owner = LockOwnerId::generate();
        let locked = mapper.lock_mapping(&shard_map, &left, owner).await.unwrap();

        let rejected = mapper
            .update_mapping_status(&shard_map, &locked, MappingStatus::Offline, LockOwnerId::NONE)
            .await;
        assert!(matches!(
            rejected,
            Err(MapperError::Operation(crate::operation::OperationError::Rejected {
                code: ResultCode::MappingLockOwnerIdMismatch,
                ..
            }))
        ));

        let updated = mapper
            .update_mapping_status(&shard_map, &locked, MappingStatus::Offline, owner)
            .await
            .unwrap();
        assert_eq!(updated.status, MappingStatus::Offline);

        let routed = mapper
            .find_shard_mapping_by_key(&shard_map, &ShardKey::from_i32(10), false)
            .await;
        assert!(matches!(routed, Err(MapperError::NoMappingForKey { .. })));
    }

    #[tokio::test]
    async fn test_merge_reassembles_split() {
        let (mapper, shard_map, _, mapping) = setup_s1().await;
        let (left, right) = mapper.split_mapping(&shard_map, &mapping, ShardKey::from_i32(50)).await.unwrap();
        let merged = mapper.merge_mappings(&shard_map, &left, &right).await.unwrap();

        assert_eq!(merged.key.as_range().unwrap().low().to_i32(), Some(0));
        assert_eq!(merged.key.as_range().unwrap().high().to_i32(), Some(100));
    }

    #[tokio::test]
    async fn test_get_mappings_filters_by_range() {
        let (mapper, shard_map, _, _) = setup_s1().await;
        let narrow = ShardRange::new(ShardKey::from_i32(10), ShardKey::from_i32(20)).unwrap();
        let hits = mapper.get_mappings(&shard_map, Some(&narrow), None).await.unwrap();
        assert_eq!(hits.len(), 1);

        let disjoint = ShardRange::new(ShardKey::from_i32(200), ShardKey::from_i32(300)).unwrap();
        let misses = mapper.get_mappings(&shard_map, Some(&disjoint), None).await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_create_point_mapping_rejects_range_map() {
        let (mapper, shard_map, shard, _) = setup_s1().await;
        let err = mapper
            .create_point_mapping(&shard_map, &shard, ShardKey::from_i32(7))
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::Conversion(ShardMapConversionError::KindMismatch { .. })));
    }
}
