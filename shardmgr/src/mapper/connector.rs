//! Resolves a [`ShardLocation`] to a live LSM [`StoreConnection`]. Kept
//! as a trait, not a concrete dial-out function, so the mapper and
//! recovery manager can hold any number of LSM handles uniformly
//! (spec.md §4.B) while tests substitute pre-wired [`FakeStore`]s
//! instead of opening real sockets.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use shardmgr_config::RetryPolicy;

use crate::entities::ShardLocation;
use crate::retry::RetryingStore;
use crate::store::{PgStore, Store, StoreConnection, StoreError};

#[async_trait]
pub trait LsmConnector: Send + Sync {
    async fn connect(&self, location: &ShardLocation) -> Result<StoreConnection, StoreError>;
}

/// Dials a real shard over `tokio-postgres`, wrapped in the same retry
/// policy every other store call gets (spec.md §4.J).
pub struct PgLsmConnector {
    policy: RetryPolicy,
}

impl PgLsmConnector {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl LsmConnector for PgLsmConnector {
    async fn connect(&self, location: &ShardLocation) -> Result<StoreConnection, StoreError> {
        let conn_string = format!(
            "host={} port={} dbname={} user=shardmgr",
            location.server, location.port, location.database
        );
        let store = PgStore::connect(&conn_string).await?;
        let retrying = RetryingStore::new(store, self.policy);
        Ok(StoreConnection::new(Arc::new(retrying)))
    }
}

/// Test/demo double: maps a [`ShardLocation`] to a pre-registered
/// [`Store`] instead of dialing out. One `FakeStore` per shard mirrors
/// how the operation engine treats GSM and every shard's LSM as
/// interchangeable `Store` instances (spec.md §4.B).
#[derive(Default)]
pub struct FakeLsmConnector {
    shards: RwLock<HashMap<ShardLocation, Arc<dyn Store>>>,
}

impl FakeLsmConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, location: ShardLocation, store: Arc<dyn Store>) {
        self.shards.write().insert(location, store);
    }
}

#[async_trait]
impl LsmConnector for FakeLsmConnector {
    async fn connect(&self, location: &ShardLocation) -> Result<StoreConnection, StoreError> {
        self.shards
            .read()
            .get(location)
            .cloned()
            .map(StoreConnection::new)
            .ok_or_else(|| StoreError::Connection(format!("no fake LSM registered for {location}")))
    }
}
