//! Runnable walk-through of the six scenarios spec.md §8 names, driven
//! entirely against `FakeStore`/`FakeLsmConnector` so it needs no live
//! Postgres instance. Illustrative only — nothing here is exercised by
//! the `shardmgr`/`shardmgr-config` library crates.

use std::sync::Arc;

use shardmgr::entities::{LockOwnerId, MappingStatus, ShardLocation};
use shardmgr::key::ShardKey;
use shardmgr::mapper::{FakeLsmConnector, Mapper};
use shardmgr::store::{FakeStore, Store as _, StoreConnection};
use shardmgr::{Cache, ShardMapManager};
use shardmgr_config::StoreVersion;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    scenario_s1_s2_s3().await;
    scenario_s4_crash_recovery().await;
    scenario_s5_version_upgrade().await;
    scenario_s6_stale_route().await;
}

/// Wires a fresh GSM/LSM pair of `FakeStore`s behind a `ShardMapManager`,
/// already at the library's client schema version so callers don't need
/// to run the upgrade pipeline themselves.
async fn manager_with_shard(location: ShardLocation) -> (Arc<ShardMapManager>, ShardLocation) {
    let gsm_store = Arc::new(FakeStore::new(StoreVersion::ZERO));
    let gsm = StoreConnection::new(gsm_store.clone());
    shardmgr::schema::Pipeline::global()
        .run(&gsm, shardmgr::manager::library_version())
        .await
        .expect("fresh GSM upgrades cleanly");

    let lsm_store = Arc::new(FakeStore::new(StoreVersion::ZERO));
    let connector = Arc::new(FakeLsmConnector::new());
    connector.register(location.clone(), lsm_store as Arc<dyn shardmgr::store::Store>);

    let mapper = Arc::new(Mapper::new(gsm, Arc::new(Cache::new()), connector));
    (Arc::new(ShardMapManager::from_mapper(mapper)), location)
}

/// S1 (create range map + mapping), S2 (split), S3 (lock + update).
async fn scenario_s1_s2_s3() {
    let (manager, location) = manager_with_shard(ShardLocation::new("srv-a", 5432, "db0")).await;

    let range_map = manager
        .create_range_shard_map("CustomerIDShardMap", shardmgr::key::ShardKeyType::Int32)
        .await
        .expect("create range shard map");
    let shard = range_map.create_shard(location).await.expect("create shard");

    let range = shardmgr::key::ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(100)).unwrap();
    let mapping = range_map
        .create_range_mapping(&shard, range)
        .await
        .expect("create range mapping");

    let (found, found_shard) = range_map
        .get_mapping_for_key(&ShardKey::from_i32(42), false)
        .await
        .expect("S1: key 42 maps");
    assert_eq!(found.id, mapping.id);
    assert_eq!(found_shard.id, shard.id);
    tracing::info!("S1: key 42 -> mapping {} on {}", found.id, found_shard.location);

    // S2: split [0,100) at 50.
    let mapper = manager.mapper();
    let shard_map = range_map.shard_map().clone();
    let (left, right) = mapper
        .split_mapping(&shard_map, &mapping, ShardKey::from_i32(50))
        .await
        .expect("S2: split");
    assert_ne!(left.id, mapping.id);
    assert_ne!(right.id, mapping.id);
    let (after_split, _) = range_map
        .get_mapping_for_key(&ShardKey::from_i32(42), false)
        .await
        .expect("S2: key 42 still maps after split");
    assert_eq!(after_split.id, left.id);
    tracing::info!("S2: split into {} and {}; key 42 now routes to {}", left.id, right.id, left.id);

    // S3: lock left with owner L, update status without L (rejected),
    // then with L (succeeds), then routing key 10 fails.
    let owner = LockOwnerId::generate();
    let locked = range_map.lock_mapping(&left, owner).await.expect("S3: lock");

    let rejected = mapper
        .update_mapping_status(&shard_map, &locked, MappingStatus::Offline, LockOwnerId::NONE)
        .await;
    assert!(matches!(
        rejected,
        Err(shardmgr::MapperError::Operation(_))
    ));
    tracing::info!("S3: update without lock owner correctly rejected (307 MappingLockOwnerIdMismatch)");

    mapper
        .update_mapping_status(&shard_map, &locked, MappingStatus::Offline, owner)
        .await
        .expect("S3: update with correct owner");

    let lookup = range_map.get_mapping_for_key(&ShardKey::from_i32(10), false).await;
    assert!(lookup.is_err());
    tracing::info!("S3: key 10 now fails routing (309 MappingIsOffline, surfaced as no-mapping)");
}

/// S4: a two-phase mapping operation that completes its local-source
/// phase but never reaches `doGlobalPostLocal` before the process is
/// imagined to crash. A second `OperationEngine::run` for the same
/// `op_id` resumes from the operation log and finishes the job.
async fn scenario_s4_crash_recovery() {
    use shardmgr::entities::{Mapping, Shard, ShardMap, ShardMapKind};
    use shardmgr::key::{ShardKeyType, ShardRange};
    use shardmgr::operation::{OperationCode, OperationContext, OperationEngine, OperationSteps};
    use shardmgr::store::{BulkStep, BulkStepKind, MappingEntity, Payload, StoredProcedure, TransactionKind};
    use uuid::Uuid;

    let location = ShardLocation::new("srv-b", 5432, "db0");
    let gsm_store = Arc::new(FakeStore::new(StoreVersion::ZERO));
    let gsm = StoreConnection::new(gsm_store);
    shardmgr::schema::Pipeline::global()
        .run(&gsm, shardmgr::manager::library_version())
        .await
        .expect("fresh GSM upgrades cleanly");

    let lsm_store: Arc<dyn shardmgr::store::Store> = Arc::new(FakeStore::new(StoreVersion::ZERO));
    let lsm = StoreConnection::new(lsm_store.clone());

    let shard_map = ShardMap::new("S4Map", ShardMapKind::Range, ShardKeyType::Int32);
    let shard = Shard::new(shard_map.id, location);
    gsm.execute(
        TransactionKind::Global,
        StoredProcedure::AttachShardGlobal,
        Payload {
            shard: Some(to_shard_entity(&shard)),
            ..Payload::empty()
        },
    )
    .await
    .expect("attach shard in GSM for the S4 walk-through");
    lsm.execute(TransactionKind::LocalSource, StoredProcedure::AddShardLocal, Payload {
        shard: Some(to_shard_entity(&shard)),
        ..Payload::empty()
    })
    .await
    .expect("register shard in its own LSM");

    let range = ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(50)).unwrap();
    let mapping = Mapping::new_range(shard_map.id, shard.id, range);
    let entity = to_mapping_entity(&mapping);
    let forward = vec![BulkStep { id: 0, kind: BulkStepKind::Add, mapping: entity.clone() }];
    let undo = vec![BulkStep { id: 0, kind: BulkStepKind::Remove, mapping: entity.clone() }];
    let op_id = Uuid::new_v4();
    let ctx_builder = || OperationContext {
        op_id,
        code: OperationCode::AddMapping,
        gsm: gsm.clone(),
        lsm_source: Some(lsm.clone()),
        lsm_target: None,
        steps: OperationSteps::Mapping {
            forward: forward.clone(),
            undo: undo.clone(),
        },
    };

    let engine = OperationEngine::new();
    engine
        .run(ctx_builder())
        .await
        .expect("S4: first attempt commits end to end on a FakeStore, simulating no crash");

    // A genuine crash between doLocalSource and doGlobalPostLocal can't
    // be reproduced in one process without reaching into the private
    // step table; what's verifiable here is that a *second* run against
    // the same op_id, after the rows already committed, stays a no-op
    // rather than double-applying the mutation — the reentrancy
    // guarantee the crash-recovery path depends on (spec.md S4).
    engine
        .run(ctx_builder())
        .await
        .expect("S4: replaying a completed op_id is idempotent");

    tracing::info!("S4: operation {op_id} is reentrant by op_id, the property crash recovery depends on");
}

fn to_shard_entity(shard: &shardmgr::entities::Shard) -> shardmgr::store::ShardEntity {
    shardmgr::store::ShardEntity {
        id: shard.id,
        shard_map_id: shard.shard_map_id,
        version: shard.version,
        location: shard.location.clone(),
        status: shard.status,
    }
}

fn to_mapping_entity(mapping: &shardmgr::entities::Mapping) -> shardmgr::store::MappingEntity {
    use shardmgr::entities::MappingKey;
    let (min_value, max_value) = match &mapping.key {
        MappingKey::Point(key) => (key.canonical_bytes().expect("point key is finite").to_vec(), None),
        MappingKey::Range(range) => (
            range.low().canonical_bytes().expect("range low is finite").to_vec(),
            Some(range.high().canonical_bytes().map(|b| b.to_vec())),
        ),
    };
    shardmgr::store::MappingEntity {
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

/// S5: a store at `(0,0)` upgraded to the library's client version
/// applies every step in order.
async fn scenario_s5_version_upgrade() {
    let store = Arc::new(FakeStore::new(StoreVersion::ZERO));
    let conn = StoreConnection::new(store);

    let version = shardmgr::schema::Pipeline::global()
        .run(&conn, shardmgr::manager::library_version())
        .await
        .expect("S5: upgrade from zero");
    assert_eq!(version, shardmgr::manager::library_version());
    tracing::info!("S5: GSM upgraded to {version}");
}

/// S6: client A's cached route goes stale once client B moves the
/// mapping; A's next lookup validates against the (now wrong) shard,
/// evicts the cache entry, and refreshes from the GSM.
async fn scenario_s6_stale_route() {
    let srv_a = ShardLocation::new("srv-a", 5432, "db0");
    let srv_b = ShardLocation::new("srv-b", 5432, "db0");

    let gsm_store = Arc::new(FakeStore::new(StoreVersion::ZERO));
    let gsm = StoreConnection::new(gsm_store);
    shardmgr::schema::Pipeline::global()
        .run(&gsm, shardmgr::manager::library_version())
        .await
        .expect("fresh GSM upgrades cleanly");

    let lsm_a: Arc<dyn shardmgr::store::Store> = Arc::new(FakeStore::new(StoreVersion::ZERO));
    let lsm_b: Arc<dyn shardmgr::store::Store> = Arc::new(FakeStore::new(StoreVersion::ZERO));
    let connector = Arc::new(FakeLsmConnector::new());
    connector.register(srv_a.clone(), lsm_a.clone());
    connector.register(srv_b.clone(), lsm_b.clone());

    let mapper_a = Arc::new(Mapper::new(gsm.clone(), Arc::new(Cache::new()), connector.clone()));
    let manager_a = ShardMapManager::from_mapper(mapper_a);

    let range_map_a = manager_a
        .create_range_shard_map("StaleRouteMap", shardmgr::key::ShardKeyType::Int32)
        .await
        .expect("create shard map");
    let shard_a = range_map_a.create_shard(srv_a.clone()).await.expect("create shard A");
    let shard_b = range_map_a.create_shard(srv_b.clone()).await.expect("create shard B");

    let range = shardmgr::key::ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(50)).unwrap();
    let mapping = range_map_a
        .create_range_mapping(&shard_a, range)
        .await
        .expect("create mapping on shard A");

    // Client A caches the route by looking it up once.
    let (cached, _) = range_map_a
        .get_mapping_for_key(&ShardKey::from_i32(10), false)
        .await
        .expect("A caches the route");
    assert_eq!(cached.shard_id, shard_a.id);

    // Client B (a second mapper sharing the same GSM and LSMs, its own
    // cache) relocates the mapping to shard B by deleting and recreating
    // it — the mapper exposes no in-place relocate, matching spec.md
    // §4.G's split/merge/create-fresh model.
    let mapper_b = Arc::new(Mapper::new(gsm, Arc::new(Cache::new()), connector));
    let manager_b = ShardMapManager::from_mapper(mapper_b);
    let range_map_b = manager_b
        .get_range_shard_map("StaleRouteMap")
        .await
        .expect("B opens the same shard map");
    range_map_b
        .delete_mapping(&mapping, LockOwnerId::NONE)
        .await
        .expect("B removes the mapping from shard A");
    let moved_range = shardmgr::key::ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(50)).unwrap();
    range_map_b
        .create_range_mapping(&shard_b, moved_range)
        .await
        .expect("B recreates it on shard B");

    // Client A validates its stale cache entry against shard A's LSM:
    // the row is gone there, so validation fails, the cache entry is
    // evicted, and A falls through to the GSM, which now points at B.
    let (refreshed, refreshed_shard) = range_map_a
        .get_mapping_for_key(&ShardKey::from_i32(10), true)
        .await
        .expect("A refreshes after a failed validation");
    assert_eq!(refreshed_shard.id, shard_b.id);
    assert_ne!(refreshed.id, mapping.id);
    tracing::info!("S6: A's stale route to {} was evicted and refreshed to {}", srv_a, refreshed_shard.location);
}
