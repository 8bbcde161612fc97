//! Converts wire-format rowset entities ([`super::payload::ShardMapEntity`]
//! and friends) into the domain types in [`crate::entities`], appending
//! them to a [`super::rowset::StoreResults`] as they're decoded off a
//! [`super::Store`] response. Shared by [`super::fake_store::FakeStore`]
//! and [`super::pg_store::PgStore`] so both backends populate rowsets the
//! same way.

use crate::entities::{Mapping, MappingKey};
use crate::key::{ShardKey, ShardRange};

use super::payload::{MappingEntity, ShardEntity, ShardMapEntity};
use super::rowset::StoreResults;

pub fn push_shard_map(results: &mut StoreResults, entity: ShardMapEntity) {
    results.shard_maps.push(crate::entities::ShardMap {
        id: entity.id,
        name: entity.name,
        kind: entity.kind,
        key_kind: entity.key_kind,
    });
}

pub fn push_shard(results: &mut StoreResults, entity: ShardEntity) {
    results.shards.push(crate::entities::Shard {
        id: entity.id,
        shard_map_id: entity.shard_map_id,
        location: entity.location,
        version: entity.version,
        status: entity.status,
    });
}

pub fn push_mapping(results: &mut StoreResults, entity: MappingEntity) {
    let low = ShardKey::from_canonical(entity.key_kind, entity.min_value);
    let key = match entity.max_value {
        None => MappingKey::Point(low),
        Some(None) => MappingKey::Range(
            ShardRange::new(low, ShardKey::max(entity.key_kind))
                .expect("store row carries a validated range"),
        ),
        Some(Some(high)) => MappingKey::Range(
            ShardRange::new(low, ShardKey::from_canonical(entity.key_kind, high))
                .expect("store row carries a validated range"),
        ),
    };

    results.mappings.push(Mapping {
        id: entity.id,
        shard_map_id: entity.shard_map_id,
        shard_id: entity.shard_id,
        key,
        status: entity.status,
        lock_owner_id: entity.lock_owner_id,
        readable: true,
        operation_id: None,
    });
}
