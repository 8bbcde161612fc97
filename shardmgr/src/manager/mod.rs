//! The manager facade (spec.md §4.I): `ShardMapManager` provisions or
//! opens a GSM, runs its schema up to this library's client version, and
//! hands out the typed shard-map views and connection builder an
//! application actually calls. `RecoveryManager` is its sibling for the
//! shard-attach/detach/replace workflow and the diagnostic
//! mismatch report added on top of it.

mod error;
mod recovery;

use std::sync::Arc;

use tracing::{info, instrument};

use shardmgr_config::{StoreVersion, GLOBAL_CLIENT_VERSION};

use crate::cache::Cache;
use crate::entities::ShardMapKind;
use crate::key::ShardKeyType;
use crate::mapper::{DefaultShardMap, ListShardMap, LsmConnector, Mapper, RangeShardMap};
use crate::schema::Pipeline;
use crate::store::{PgStore, StoreConnection};

pub use error::ManagerError;
pub use recovery::{MappingDifference, RecoveryManager};

/// Whether `ShardMapManager::open` preloads the cache (spec.md §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Preload every shard map and mapping in one pass at open time.
    Eager,
    /// Defer every GSM read until the first lookup that needs it.
    Lazy,
}

/// Owns the process-wide cache and GSM connection a whole application
/// shares (spec.md §9 "Global mutable state" — the cache lives on this
/// value, not behind a `static`). Cheap to share via `Arc`.
pub struct ShardMapManager {
    mapper: Arc<Mapper>,
}

impl ShardMapManager {
    /// `CreateShardMapManager(connStr)`: provisions a fresh GSM schema up
    /// to this library's client version and returns a handle to it.
    #[instrument(skip(connector))]
    pub async fn create(conn_string: &str, connector: Arc<dyn LsmConnector>) -> Result<Self, ManagerError> {
        let gsm = connect_gsm(conn_string).await?;
        let version = Pipeline::global().run(&gsm, GLOBAL_CLIENT_VERSION).await?;
        info!(%version, "provisioned GSM schema");
        let mapper = Arc::new(Mapper::new(gsm, Arc::new(Cache::new()), connector));
        Ok(Self { mapper })
    }

    /// `GetShardMapManager(connStr, loadPolicy)`: opens a handle to an
    /// already-provisioned GSM, without running the upgrade pipeline.
    #[instrument(skip(connector))]
    pub async fn open(conn_string: &str, load_policy: LoadPolicy, connector: Arc<dyn LsmConnector>) -> Result<Self, ManagerError> {
        let gsm = connect_gsm(conn_string).await?;
        let mapper = Arc::new(Mapper::new(gsm, Arc::new(Cache::new()), connector));
        let manager = Self { mapper };
        if load_policy == LoadPolicy::Eager {
            manager.mapper.preload_all().await?;
        }
        Ok(manager)
    }

    /// Wraps an already-connected GSM `Mapper`, for callers (tests, the
    /// `demos/` binary) that build their own `StoreConnection`/
    /// `LsmConnector` instead of dialing a real Postgres GSM.
    pub fn from_mapper(mapper: Arc<Mapper>) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    pub async fn create_list_shard_map(&self, name: impl Into<String>, key_kind: ShardKeyType) -> Result<ListShardMap, ManagerError> {
        let shard_map = self.mapper.create_shard_map(name, ShardMapKind::List, key_kind).await?;
        Ok(ListShardMap::try_new(shard_map, Arc::clone(&self.mapper)).expect("kind just created as List"))
    }

    pub async fn create_range_shard_map(&self, name: impl Into<String>, key_kind: ShardKeyType) -> Result<RangeShardMap, ManagerError> {
        let shard_map = self.mapper.create_shard_map(name, ShardMapKind::Range, key_kind).await?;
        Ok(RangeShardMap::try_new(shard_map, Arc::clone(&self.mapper)).expect("kind just created as Range"))
    }

    pub async fn create_default_shard_map(&self, name: impl Into<String>) -> Result<DefaultShardMap, ManagerError> {
        let shard_map = self
            .mapper
            .create_shard_map(name, ShardMapKind::Default, ShardKeyType::Bytes)
            .await?;
        Ok(DefaultShardMap::try_new(shard_map, Arc::clone(&self.mapper)).expect("kind just created as Default"))
    }

    pub async fn get_list_shard_map(&self, name: &str) -> Result<ListShardMap, ManagerError> {
        let shard_map = self.mapper.get_shard_map(name).await?;
        Ok(ListShardMap::try_new(shard_map, Arc::clone(&self.mapper))?)
    }

    pub async fn get_range_shard_map(&self, name: &str) -> Result<RangeShardMap, ManagerError> {
        let shard_map = self.mapper.get_shard_map(name).await?;
        Ok(RangeShardMap::try_new(shard_map, Arc::clone(&self.mapper))?)
    }

    pub async fn get_default_shard_map(&self, name: &str) -> Result<DefaultShardMap, ManagerError> {
        let shard_map = self.mapper.get_shard_map(name).await?;
        Ok(DefaultShardMap::try_new(shard_map, Arc::clone(&self.mapper))?)
    }
}

async fn connect_gsm(conn_string: &str) -> Result<StoreConnection, ManagerError> {
    let store = PgStore::connect(conn_string).await?;
    Ok(StoreConnection::new(Arc::new(store)))
}

/// Library schema version this build of the crate understands, exposed
/// for callers (and the connection builder's ApplicationName suffix)
/// that need it outside of a live upgrade run.
pub fn library_version() -> StoreVersion {
    GLOBAL_CLIENT_VERSION
}
