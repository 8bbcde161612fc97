use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use shardmgr_config::StoreVersion;

use crate::entities::{LockOwnerId, MappingStatus};

use super::convert::{push_mapping, push_shard, push_shard_map};
use super::error::StoreError;
use super::payload::{
    BulkStepKind, MappingEntity, Payload, SchemaInfoEntity, ShardEntity, ShardMapEntity,
};
use super::procedure::{StoredProcedure, TransactionKind};
use super::result_code::ResultCode;
use super::rowset::{OperationLogEntry, StoreCallResult, StoreResults};
use super::trait_def::Store;

/// In-memory [`Store`] double. Mirrors the GSM/LSM stored-procedure
/// contract closely enough to drive the operation engine and mapper test
/// suites (spec.md §8) without a live Postgres instance. Not a
/// production backend: see [`super::pg_store::PgStore`] for that.
///
/// One `FakeStore` instance plays either role — a GSM or a single
/// shard's LSM — depending only on which procedures a test drives it
/// with (spec.md §4.B: "GSM and LSM are both just a `Store` instance").
#[derive(Default)]
pub struct FakeStore {
    inner: Mutex<Inner>,
}

#[derive(Clone)]
struct MappingRow {
    entity: MappingEntity,
    /// `false` while a two-phase GSM operation has this row pending
    /// (spec.md §3 invariant 4: pending rows are invisible to routing).
    /// Always `true` for an LSM-side row; the LSM tracks reentrancy via
    /// `operation_id` alone (`LastOperationId`, spec.md §6).
    readable: bool,
    operation_id: Option<Uuid>,
}

#[derive(Clone)]
struct ShardRow {
    entity: ShardEntity,
    readable: bool,
    operation_id: Option<Uuid>,
}

#[derive(Default)]
struct Inner {
    version: StoreVersion,
    shard_maps: HashMap<Uuid, ShardMapEntity>,
    shard_map_names: HashMap<String, Uuid>,
    shards: HashMap<Uuid, ShardRow>,
    mappings: HashMap<Uuid, MappingRow>,
    operations: HashMap<Uuid, OperationLogEntry>,
    schema_info: Vec<SchemaInfoEntity>,
}

fn key_le(a: &[u8], b: &[u8]) -> bool {
    a <= b
}

fn key_lt(a: &[u8], b: &[u8]) -> bool {
    a < b
}

/// Whether `key` falls inside `mapping`'s range or equals its point.
/// `max_value` follows the wire convention: `None` means a point
/// mapping, `Some(None)` means a range open on the high end (the `+∞`
/// sentinel, spec.md §4.A).
fn mapping_contains(mapping: &MappingEntity, key: &[u8]) -> bool {
    match &mapping.max_value {
        None => mapping.min_value == key,
        Some(None) => key_le(&mapping.min_value, key),
        Some(Some(high)) => key_le(&mapping.min_value, key) && key_lt(key, high),
    }
}

fn ranges_overlap(a: &MappingEntity, b: &MappingEntity) -> bool {
    match (&a.max_value, &b.max_value) {
        (None, None) => a.min_value == b.min_value,
        (None, Some(_)) => mapping_contains(b, &a.min_value),
        (Some(_), None) => mapping_contains(a, &b.min_value),
        (Some(a_high), Some(b_high)) => {
            let a_high_bounds = |k: &[u8]| a_high.as_deref().map_or(true, |h| key_lt(k, h));
            let b_high_bounds = |k: &[u8]| b_high.as_deref().map_or(true, |h| key_lt(k, h));
            key_le(&a.min_value, &b.min_value) && a_high_bounds(&b.min_value)
                || key_le(&b.min_value, &a.min_value) && b_high_bounds(&a.min_value)
        }
    }
}

fn missing_parameters() -> StoreError {
    StoreError::semantic(ResultCode::MissingParameters)
}

impl FakeStore {
    pub fn new(version: StoreVersion) -> Self {
        Self {
            inner: Mutex::new(Inner {
                version,
                ..Inner::default()
            }),
        }
    }

    /// Records (or, on retry, re-records) the operation-log row bundled
    /// into a `*Begin` call, as the real GSM stored procedures do in the
    /// same transaction as the row mutations (spec.md §3, §6).
    fn start_log_entry(inner: &mut Inner, op_id: Uuid, payload: &Payload) {
        if let Some(entry) = &payload.log_entry {
            inner.operations.insert(op_id, entry.clone());
        }
    }

    /// Deletes the operation-log row on a successful `*End` call
    /// (spec.md §3 "Lifecycle": log entries exist only for the duration
    /// of a two-phase operation).
    fn finish_log_entry(inner: &mut Inner, op_id: Uuid) {
        inner.operations.remove(&op_id);
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn execute_operation(
        &self,
        _kind: TransactionKind,
        procedure: StoredProcedure,
        payload: Payload,
    ) -> Result<StoreCallResult, StoreError> {
        let mut inner = self.inner.lock();

        let result = match procedure {
            StoredProcedure::GetStoreVersionGlobal | StoredProcedure::GetStoreVersionLocal => {
                let mut results = StoreResults::empty();
                results.store_version = Some(inner.version);
                StoreCallResult::success(results)
            }

            StoredProcedure::AddShardMapGlobal => {
                let entity = payload.shard_map.ok_or_else(missing_parameters)?;
                if inner.shard_map_names.contains_key(&entity.name) {
                    StoreCallResult::failure(ResultCode::ShardMapAlreadyExists)
                } else {
                    inner.shard_map_names.insert(entity.name.clone(), entity.id);
                    inner.shard_maps.insert(entity.id, entity);
                    StoreCallResult::success(StoreResults::empty())
                }
            }

            StoredProcedure::FindShardMapByNameGlobal => {
                let name = payload.shard_map_name.ok_or_else(missing_parameters)?;
                match inner.shard_map_names.get(&name).copied() {
                    Some(id) => {
                        let entity = inner.shard_maps.get(&id).cloned().unwrap();
                        let mut results = StoreResults::empty();
                        results.store_version = Some(inner.version);
                        push_shard_map(&mut results, entity);
                        StoreCallResult::success(results)
                    }
                    None => StoreCallResult::failure(ResultCode::ShardMapDoesNotExist),
                }
            }

            StoredProcedure::GetShardMapsGlobal => {
                let mut results = StoreResults::empty();
                for entity in inner.shard_maps.values().cloned() {
                    push_shard_map(&mut results, entity);
                }
                StoreCallResult::success(results)
            }

            StoredProcedure::GetAllDistinctShardLocationsGlobal => {
                let mut seen = std::collections::BTreeSet::new();
                for row in inner.shards.values() {
                    seen.insert(row.entity.location.clone());
                }
                let mut results = StoreResults::empty();
                results.locations = seen.into_iter().collect();
                StoreCallResult::success(results)
            }

            StoredProcedure::RemoveShardMapGlobal => {
                let entity = payload.shard_map.ok_or_else(missing_parameters)?;
                let has_shards = inner.shards.values().any(|s| s.entity.shard_map_id == entity.id);
                if has_shards {
                    StoreCallResult::failure(ResultCode::ShardMapHasShards)
                } else if inner.shard_maps.remove(&entity.id).is_some() {
                    inner.shard_map_names.remove(&entity.name);
                    StoreCallResult::success(StoreResults::empty())
                } else {
                    StoreCallResult::failure(ResultCode::ShardMapDoesNotExist)
                }
            }

            StoredProcedure::GetShardsGlobal => {
                let shard_map_id = payload.shard.as_ref().map(|s| s.shard_map_id);
                let mut results = StoreResults::empty();
                for row in inner.shards.values() {
                    if row.readable && shard_map_id.map_or(true, |id| id == row.entity.shard_map_id) {
                        push_shard(&mut results, row.entity.clone());
                    }
                }
                StoreCallResult::success(results)
            }

            StoredProcedure::FindShardByLocationGlobal => {
                let location = payload.location.ok_or_else(missing_parameters)?;
                match inner.shards.values().find(|row| row.entity.location == location) {
                    Some(row) => {
                        let mut results = StoreResults::empty();
                        push_shard(&mut results, row.entity.clone());
                        StoreCallResult::success(results)
                    }
                    None => StoreCallResult::failure(ResultCode::ShardDoesNotExist),
                }
            }

            StoredProcedure::BulkOperationShardsGlobalBegin => {
                let op_id = payload.operation_id.ok_or_else(missing_parameters)?;
                let mut failure = None;
                for step in &payload.shard_bulk_steps {
                    match step.kind {
                        BulkStepKind::Add => {
                            if inner
                                .shards
                                .get(&step.shard.id)
                                .is_some_and(|row| row.operation_id == Some(op_id))
                            {
                                continue;
                            }
                            if !inner.shard_maps.contains_key(&step.shard.shard_map_id) {
                                failure = Some(ResultCode::ShardMapDoesNotExist);
                                break;
                            }
                            if inner.shards.values().any(|row| {
                                row.entity.shard_map_id == step.shard.shard_map_id
                                    && row.entity.location == step.shard.location
                            }) {
                                failure = Some(ResultCode::ShardLocationAlreadyExists);
                                break;
                            }
                            inner.shards.insert(
                                step.shard.id,
                                ShardRow {
                                    entity: step.shard.clone(),
                                    readable: false,
                                    operation_id: Some(op_id),
                                },
                            );
                        }
                        BulkStepKind::Remove => {
                            let Some(row) = inner.shards.get_mut(&step.shard.id) else {
                                failure = Some(ResultCode::ShardDoesNotExist);
                                break;
                            };
                            row.readable = false;
                            row.operation_id = Some(op_id);
                        }
                        BulkStepKind::Update => {
                            let Some(row) = inner.shards.get_mut(&step.shard.id) else {
                                failure = Some(ResultCode::ShardDoesNotExist);
                                break;
                            };
                            if row.entity.version != step.shard.version {
                                failure = Some(ResultCode::ShardVersionMismatch);
                                break;
                            }
                            row.entity = step.shard.clone();
                            row.readable = false;
                            row.operation_id = Some(op_id);
                        }
                    }
                }
                match failure {
                    Some(code) => StoreCallResult::failure(code),
                    None => {
                        Self::start_log_entry(&mut inner, op_id, &payload);
                        StoreCallResult::success(StoreResults::empty())
                    }
                }
            }

            StoredProcedure::BulkOperationShardsGlobalEnd => {
                let op_id = payload.operation_id.ok_or_else(missing_parameters)?;
                let mut failure = None;
                for step in &payload.shard_bulk_steps {
                    match step.kind {
                        BulkStepKind::Add | BulkStepKind::Update => {
                            if let Some(row) = inner.shards.get_mut(&step.shard.id) {
                                row.entity = step.shard.clone();
                                row.readable = true;
                                row.operation_id = None;
                            }
                        }
                        BulkStepKind::Remove => {
                            let has_mappings =
                                inner.mappings.values().any(|m| m.entity.shard_id == step.shard.id);
                            if has_mappings {
                                failure = Some(ResultCode::ShardHasMappings);
                                break;
                            }
                            inner.shards.remove(&step.shard.id);
                        }
                    }
                }
                match failure {
                    Some(code) => StoreCallResult::failure(code),
                    None => {
                        Self::finish_log_entry(&mut inner, op_id);
                        StoreCallResult::success(StoreResults::empty())
                    }
                }
            }

            StoredProcedure::FindMappingByKeyGlobal => {
                let key = payload.key.ok_or_else(missing_parameters)?;
                let found = inner
                    .mappings
                    .values()
                    .find(|row| row.readable && row.entity.status == MappingStatus::Online && mapping_contains(&row.entity, &key))
                    .map(|row| row.entity.clone());
                match found {
                    Some(entity) => {
                        let mut results = StoreResults::empty();
                        push_mapping(&mut results, entity);
                        StoreCallResult::success(results)
                    }
                    None => StoreCallResult::failure(ResultCode::MappingNotFoundForKey),
                }
            }

            StoredProcedure::FindShardMappingByIdGlobal => {
                let entity = payload.mapping.ok_or_else(missing_parameters)?;
                match inner.mappings.get(&entity.id).cloned() {
                    Some(row) => {
                        let mut results = StoreResults::empty();
                        push_mapping(&mut results, row.entity);
                        StoreCallResult::success(results)
                    }
                    None => StoreCallResult::failure(ResultCode::MappingDoesNotExist),
                }
            }

            StoredProcedure::GetAllMappingsGlobal => {
                let shard_map_id = payload.shard.as_ref().map(|s| s.shard_map_id);
                let mut results = StoreResults::empty();
                for row in inner.mappings.values() {
                    if !row.readable {
                        continue;
                    }
                    let in_map = shard_map_id.map_or(true, |id| {
                        inner.shards.get(&row.entity.shard_id).is_some_and(|s| s.entity.shard_map_id == id)
                    });
                    if in_map {
                        push_mapping(&mut results, row.entity.clone());
                    }
                }
                StoreCallResult::success(results)
            }

            StoredProcedure::BulkOperationShardMappingsGlobalBegin => {
                let op_id = payload.operation_id.ok_or_else(missing_parameters)?;
                let mut failure = None;
                for step in &payload.bulk_steps {
                    match step.kind {
                        BulkStepKind::Add => {
                            if inner
                                .mappings
                                .get(&step.mapping.id)
                                .is_some_and(|row| row.operation_id == Some(op_id))
                            {
                                continue;
                            }
                            if payload.validate {
                                let conflict = inner
                                    .mappings
                                    .values()
                                    .any(|row| row.readable && ranges_overlap(&row.entity, &step.mapping));
                                if conflict {
                                    let is_point = step.mapping.max_value.is_none();
                                    failure = Some(if is_point {
                                        ResultCode::PointAlreadyMapped
                                    } else {
                                        ResultCode::RangeAlreadyMapped
                                    });
                                    break;
                                }
                            }
                            inner.mappings.insert(
                                step.mapping.id,
                                MappingRow {
                                    entity: step.mapping.clone(),
                                    readable: false,
                                    operation_id: Some(op_id),
                                },
                            );
                        }
                        BulkStepKind::Remove | BulkStepKind::Update => {
                            let Some(row) = inner.mappings.get_mut(&step.mapping.id) else {
                                failure = Some(ResultCode::MappingDoesNotExist);
                                break;
                            };
                            if !row.entity.lock_owner_id.permits(step.mapping.lock_owner_id) {
                                failure = Some(ResultCode::MappingLockOwnerIdMismatch);
                                break;
                            }
                            if step.kind == BulkStepKind::Update {
                                row.entity = step.mapping.clone();
                            }
                            row.readable = false;
                            row.operation_id = Some(op_id);
                        }
                    }
                }
                match failure {
                    Some(code) => StoreCallResult::failure(code),
                    None => {
                        Self::start_log_entry(&mut inner, op_id, &payload);
                        StoreCallResult::success(StoreResults::empty())
                    }
                }
            }

            StoredProcedure::BulkOperationShardMappingsGlobalEnd => {
                let op_id = payload.operation_id.ok_or_else(missing_parameters)?;
                for step in &payload.bulk_steps {
                    match step.kind {
                        BulkStepKind::Add | BulkStepKind::Update => {
                            if let Some(row) = inner.mappings.get_mut(&step.mapping.id) {
                                row.entity = step.mapping.clone();
                                row.readable = true;
                                row.operation_id = None;
                            }
                        }
                        BulkStepKind::Remove => {
                            inner.mappings.remove(&step.mapping.id);
                        }
                    }
                }
                Self::finish_log_entry(&mut inner, op_id);
                StoreCallResult::success(StoreResults::empty())
            }

            StoredProcedure::LockOrUnlockMappingsGlobal => {
                use super::payload::LockScope;
                let presented = payload.lock_owner_id.unwrap_or(LockOwnerId::NONE);
                let scope = payload.lock_scope.unwrap_or(LockScope::One);
                match scope {
                    LockScope::One => {
                        let entity = payload.mapping.ok_or_else(missing_parameters)?;
                        match inner.mappings.get_mut(&entity.id) {
                            Some(row) => {
                                if !row.entity.lock_owner_id.permits(presented) {
                                    StoreCallResult::failure(ResultCode::MappingLockOwnerIdMismatch)
                                } else if row.entity.lock_owner_id.is_locked() && entity.lock_owner_id.is_locked() {
                                    StoreCallResult::failure(ResultCode::MappingAlreadyLocked)
                                } else {
                                    row.entity.lock_owner_id = entity.lock_owner_id;
                                    StoreCallResult::success(StoreResults::empty())
                                }
                            }
                            None => StoreCallResult::failure(ResultCode::MappingDoesNotExist),
                        }
                    }
                    LockScope::AllInShardMap => {
                        let shard_map_id = payload
                            .shard_map
                            .as_ref()
                            .map(|s| s.id)
                            .ok_or_else(missing_parameters)?;
                        let new_owner = payload.mapping.as_ref().map(|m| m.lock_owner_id).unwrap_or(LockOwnerId::NONE);
                        for row in inner.mappings.values_mut() {
                            if row.entity.shard_map_id == shard_map_id && row.entity.lock_owner_id.permits(presented) {
                                row.entity.lock_owner_id = new_owner;
                            }
                        }
                        StoreCallResult::success(StoreResults::empty())
                    }
                    LockScope::AllForOwner => {
                        for row in inner.mappings.values_mut() {
                            if row.entity.lock_owner_id == presented {
                                row.entity.lock_owner_id = LockOwnerId::NONE;
                            }
                        }
                        StoreCallResult::success(StoreResults::empty())
                    }
                }
            }

            StoredProcedure::GetAllShardingSchemaInfosGlobal => {
                let mut results = StoreResults::empty();
                results.schema_info = inner.schema_info.clone();
                StoreCallResult::success(results)
            }

            StoredProcedure::FindShardingSchemaInfoByNameGlobal => {
                let name = payload.shard_map_name.ok_or_else(missing_parameters)?;
                match inner.schema_info.iter().find(|s| s.name == name).cloned() {
                    Some(info) => {
                        let mut results = StoreResults::empty();
                        results.schema_info.push(info);
                        StoreCallResult::success(results)
                    }
                    None => StoreCallResult::failure(ResultCode::SchemaInfoNameDoesNotExist),
                }
            }

            StoredProcedure::AddShardingSchemaInfoGlobal => {
                let info = payload.schema_info.ok_or_else(missing_parameters)?;
                if inner.schema_info.iter().any(|s| s.name == info.name) {
                    StoreCallResult::failure(ResultCode::SchemaInfoNameConflict)
                } else {
                    inner.schema_info.push(info);
                    StoreCallResult::success(StoreResults::empty())
                }
            }

            StoredProcedure::RemoveShardingSchemaInfoGlobal => {
                let name = payload.shard_map_name.ok_or_else(missing_parameters)?;
                let before = inner.schema_info.len();
                inner.schema_info.retain(|s| s.name != name);
                if inner.schema_info.len() == before {
                    StoreCallResult::failure(ResultCode::SchemaInfoNameDoesNotExist)
                } else {
                    StoreCallResult::success(StoreResults::empty())
                }
            }

            StoredProcedure::UpdateShardingSchemaInfoGlobal => {
                let info = payload.schema_info.ok_or_else(missing_parameters)?;
                match inner.schema_info.iter_mut().find(|s| s.name == info.name) {
                    Some(existing) => {
                        existing.schema = info.schema;
                        StoreCallResult::success(StoreResults::empty())
                    }
                    None => StoreCallResult::failure(ResultCode::SchemaInfoNameDoesNotExist),
                }
            }

            StoredProcedure::AttachShardGlobal => {
                let shard = payload.shard.ok_or_else(missing_parameters)?;
                inner.shards.insert(
                    shard.id,
                    ShardRow {
                        entity: shard.clone(),
                        readable: true,
                        operation_id: None,
                    },
                );
                for mapping in payload.mappings {
                    inner.mappings.insert(
                        mapping.id,
                        MappingRow {
                            entity: mapping,
                            readable: true,
                            operation_id: None,
                        },
                    );
                }
                StoreCallResult::success(StoreResults::empty())
            }

            StoredProcedure::DetachShardGlobal => {
                let location = payload.location.ok_or_else(missing_parameters)?;
                let shard_id = inner.shards.iter().find(|(_, row)| row.entity.location == location).map(|(id, _)| *id);
                match shard_id {
                    Some(id) => {
                        inner.shards.remove(&id);
                        inner.mappings.retain(|_, row| row.entity.shard_id != id);
                        StoreCallResult::success(StoreResults::empty())
                    }
                    None => StoreCallResult::failure(ResultCode::ShardDoesNotExist),
                }
            }

            StoredProcedure::ReplaceShardMappingsGlobal => {
                let shard = payload.shard.ok_or_else(missing_parameters)?;
                inner.mappings.retain(|_, row| row.entity.shard_id != shard.id);
                for mapping in payload.mappings {
                    inner.mappings.insert(
                        mapping.id,
                        MappingRow {
                            entity: mapping,
                            readable: true,
                            operation_id: None,
                        },
                    );
                }
                StoreCallResult::success(StoreResults::empty())
            }

            StoredProcedure::FindAndUpdateOperationLogEntryByIdGlobal => {
                let op_id = payload.operation_id.ok_or_else(missing_parameters)?;
                let existing = inner.operations.get(&op_id).cloned();
                match existing {
                    Some(mut entry) => {
                        if let Some(update) = &payload.log_entry {
                            entry.undo_start_state = update.undo_start_state;
                        }
                        inner.operations.insert(op_id, entry.clone());
                        let mut results = StoreResults::empty();
                        results.operations.push(entry);
                        StoreCallResult::success(results)
                    }
                    None => StoreCallResult::success(StoreResults::empty()),
                }
            }

            // --- LSM procedures ---
            StoredProcedure::GetAllShardsLocal => {
                let mut results = StoreResults::empty();
                for row in inner.shards.values() {
                    push_shard(&mut results, row.entity.clone());
                }
                StoreCallResult::success(results)
            }

            StoredProcedure::ValidateShardLocal => {
                let shard = payload.shard.ok_or_else(missing_parameters)?;
                if inner.shards.contains_key(&shard.id) {
                    StoreCallResult::success(StoreResults::empty())
                } else {
                    StoreCallResult::failure(ResultCode::ShardDoesNotExist)
                }
            }

            StoredProcedure::AddShardLocal => {
                let shard = payload.shard.ok_or_else(missing_parameters)?;
                inner.shards.insert(
                    shard.id,
                    ShardRow {
                        entity: shard,
                        readable: true,
                        operation_id: None,
                    },
                );
                StoreCallResult::success(StoreResults::empty())
            }

            StoredProcedure::RemoveShardLocal => {
                let shard = payload.shard.ok_or_else(missing_parameters)?;
                inner.shards.remove(&shard.id);
                StoreCallResult::success(StoreResults::empty())
            }

            StoredProcedure::UpdateShardLocal => {
                let shard = payload.shard.ok_or_else(missing_parameters)?;
                inner.shards.insert(
                    shard.id,
                    ShardRow {
                        entity: shard,
                        readable: true,
                        operation_id: None,
                    },
                );
                StoreCallResult::success(StoreResults::empty())
            }

            StoredProcedure::GetAllShardMappingsLocal => {
                let mut results = StoreResults::empty();
                for row in inner.mappings.values() {
                    push_mapping(&mut results, row.entity.clone());
                }
                StoreCallResult::success(results)
            }

            StoredProcedure::FindShardMappingByKeyLocal => {
                let key = payload.key.ok_or_else(missing_parameters)?;
                match inner.mappings.values().find(|row| mapping_contains(&row.entity, &key)).cloned() {
                    Some(row) => {
                        let mut results = StoreResults::empty();
                        push_mapping(&mut results, row.entity);
                        StoreCallResult::success(results)
                    }
                    None => StoreCallResult::failure(ResultCode::MappingNotFoundForKey),
                }
            }

            StoredProcedure::ValidateMappingLocal => {
                let entity = payload.mapping.ok_or_else(missing_parameters)?;
                if !inner.shards.contains_key(&entity.shard_id) {
                    StoreCallResult::failure(ResultCode::ShardMapDoesNotExist)
                } else {
                    match inner.mappings.get(&entity.id) {
                        Some(row) if row.entity.status == MappingStatus::Offline => {
                            StoreCallResult::failure(ResultCode::MappingIsOffline)
                        }
                        Some(_) => StoreCallResult::success(StoreResults::empty()),
                        None => StoreCallResult::failure(ResultCode::MappingDoesNotExist),
                    }
                }
            }

            StoredProcedure::BulkOperationShardMappingsLocal => {
                let op_id = payload.operation_id;
                for step in &payload.bulk_steps {
                    let already_applied = inner
                        .mappings
                        .get(&step.mapping.id)
                        .is_some_and(|row| op_id.is_some() && row.operation_id == op_id);
                    if already_applied {
                        continue;
                    }
                    match step.kind {
                        BulkStepKind::Add | BulkStepKind::Update => {
                            inner.mappings.insert(
                                step.mapping.id,
                                MappingRow {
                                    entity: step.mapping.clone(),
                                    readable: true,
                                    operation_id: op_id,
                                },
                            );
                        }
                        BulkStepKind::Remove => {
                            inner.mappings.remove(&step.mapping.id);
                        }
                    }
                }
                StoreCallResult::success(StoreResults::empty())
            }

            StoredProcedure::KillSessionsForShardMappingLocal => StoreCallResult::success(StoreResults::empty()),

            StoredProcedure::UpgradeStoreGlobal | StoredProcedure::UpgradeStoreLocal => {
                if let Some(version) = payload.store_version {
                    inner.version = version;
                }
                StoreCallResult::success(StoreResults::empty())
            }
        };

        Ok(result)
    }

    async fn execute_command_batch(
        &self,
        kind: TransactionKind,
        commands: Vec<(StoredProcedure, Payload)>,
    ) -> Result<Vec<StoreCallResult>, StoreError> {
        let mut out = Vec::with_capacity(commands.len());
        for (procedure, payload) in commands {
            let result = self.execute_operation(kind, procedure, payload).await?;
            let stop = !result.is_success();
            out.push(result);
            if stop {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ShardMapKind, ShardProtocol};
    use crate::key::ShardKeyType;

    fn sample_shard_map() -> ShardMapEntity {
        ShardMapEntity {
            id: Uuid::new_v4(),
            name: "customers".into(),
            kind: ShardMapKind::Range,
            key_kind: ShardKeyType::Int32,
        }
    }

    fn sample_shard(shard_map_id: Uuid) -> ShardEntity {
        ShardEntity {
            id: Uuid::new_v4(),
            shard_map_id,
            version: Uuid::new_v4(),
            location: crate::entities::ShardLocation {
                protocol: ShardProtocol::Tcp,
                server: "db0".into(),
                port: 5432,
                database: "shard0".into(),
            },
            status: crate::entities::ShardStatus::Online,
        }
    }

    #[tokio::test]
    async fn test_add_and_find_shard_map() {
        let store = FakeStore::new(StoreVersion::new(1, 3));
        let entity = sample_shard_map();

        let add = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::AddShardMapGlobal,
                Payload {
                    shard_map: Some(entity.clone()),
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();
        assert!(add.is_success());

        let dup = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::AddShardMapGlobal,
                Payload {
                    shard_map: Some(entity.clone()),
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();
        assert_eq!(dup.code, ResultCode::ShardMapAlreadyExists);

        let found = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::FindShardMapByNameGlobal,
                Payload {
                    shard_map_name: Some("customers".into()),
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();
        assert!(found.is_success());
        assert_eq!(found.results.shard_maps.len(), 1);
    }

    async fn add_shard_via_bulk(store: &FakeStore, shard: &ShardEntity) {
        use super::super::payload::ShardBulkStep;
        let op_id = Uuid::new_v4();
        let step = ShardBulkStep {
            id: 1,
            kind: BulkStepKind::Add,
            shard: shard.clone(),
        };
        let begin = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardsGlobalBegin,
                Payload {
                    operation_id: Some(op_id),
                    shard_bulk_steps: vec![step.clone()],
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();
        assert!(begin.is_success());
        let end = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardsGlobalEnd,
                Payload {
                    operation_id: Some(op_id),
                    shard_bulk_steps: vec![step],
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();
        assert!(end.is_success());
    }

    #[tokio::test]
    async fn test_remove_shard_map_with_shards_rejected() {
        let store = FakeStore::new(StoreVersion::ZERO);
        let shard_map = sample_shard_map();
        store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::AddShardMapGlobal,
                Payload {
                    shard_map: Some(shard_map.clone()),
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();

        let shard = sample_shard(shard_map.id);
        add_shard_via_bulk(&store, &shard).await;

        let remove = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::RemoveShardMapGlobal,
                Payload {
                    shard_map: Some(shard_map),
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();
        assert_eq!(remove.code, ResultCode::ShardMapHasShards);
    }

    #[tokio::test]
    async fn test_bulk_shard_add_is_visible_only_after_end() {
        let store = FakeStore::new(StoreVersion::ZERO);
        let shard_map = sample_shard_map();
        store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::AddShardMapGlobal,
                Payload {
                    shard_map: Some(shard_map.clone()),
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();

        use super::super::payload::ShardBulkStep;
        let shard = sample_shard(shard_map.id);
        let op_id = Uuid::new_v4();
        let step = ShardBulkStep {
            id: 1,
            kind: BulkStepKind::Add,
            shard: shard.clone(),
        };
        store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardsGlobalBegin,
                Payload {
                    operation_id: Some(op_id),
                    shard_bulk_steps: vec![step.clone()],
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();

        let mid = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::GetShardsGlobal,
                Payload::empty(),
            )
            .await
            .unwrap();
        assert!(mid.results.shards.is_empty(), "pending shard must be invisible before End");

        store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardsGlobalEnd,
                Payload {
                    operation_id: Some(op_id),
                    shard_bulk_steps: vec![step],
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();

        let after = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::GetShardsGlobal,
                Payload::empty(),
            )
            .await
            .unwrap();
        assert_eq!(after.results.shards.len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_mapping_begin_end_reentrant() {
        let store = FakeStore::new(StoreVersion::ZERO);
        let shard_map = sample_shard_map();
        let shard = sample_shard(shard_map.id);
        let mapping = MappingEntity {
            id: Uuid::new_v4(),
            shard_map_id: shard_map.id,
            shard_id: shard.id,
            key_kind: ShardKeyType::Int32,
            min_value: crate::key::ShardKey::from_i32(0).canonical_bytes().unwrap().to_vec(),
            max_value: Some(Some(crate::key::ShardKey::from_i32(100).canonical_bytes().unwrap().to_vec())),
            status: MappingStatus::Online,
            lock_owner_id: LockOwnerId::NONE,
        };

        let op_id = Uuid::new_v4();
        let step = super::super::payload::BulkStep {
            id: 1,
            kind: BulkStepKind::Add,
            mapping: mapping.clone(),
        };
        let payload = Payload {
            operation_id: Some(op_id),
            bulk_steps: vec![step],
            validate: true,
            ..Payload::empty()
        };

        let first = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardMappingsGlobalBegin,
                payload.clone(),
            )
            .await
            .unwrap();
        assert!(first.is_success());

        // Replaying the same Begin call (as a retry after a crash) must be a no-op, not a conflict.
        let retry = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::BulkOperationShardMappingsGlobalBegin,
                payload,
            )
            .await
            .unwrap();
        assert!(retry.is_success());

        let lookup = store
            .execute_operation(
                TransactionKind::Global,
                StoredProcedure::FindMappingByKeyGlobal,
                Payload {
                    key: Some(crate::key::ShardKey::from_i32(42).canonical_bytes().unwrap().to_vec()),
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();
        assert_eq!(lookup.code, ResultCode::MappingNotFoundForKey, "pending add must stay invisible to routing");
    }
}
