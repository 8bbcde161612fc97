//! Client library and coordination protocol for horizontally sharded
//! Postgres-compatible databases (spec.md §1).
//!
//! The surface a typical application touches is small: a
//! [`manager::ShardMapManager`] opens or provisions a GSM, hands out
//! [`mapper::ListShardMap`]/[`mapper::RangeShardMap`]/
//! [`mapper::DefaultShardMap`] views for data-dependent routing and
//! management, and a [`conn::ConnectionBuilder`] turns a resolved
//! [`entities::Shard`] into a connection string. Everything else —
//! the key algebra, the store/codec layer, the two-phase operation
//! engine, the cache — is reachable for callers that need to go below
//! the facade (recovery tooling, alternate `Store` backends, tests).

pub mod cache;
pub mod conn;
pub mod entities;
pub mod key;
pub mod manager;
pub mod mapper;
pub mod operation;
pub mod retry;
pub mod schema;
pub mod store;

pub use cache::Cache;
pub use conn::{ConnectionBuilder, ConnectionBuilderError, ConnectionRequest};
pub use manager::{LoadPolicy, ManagerError, MappingDifference, RecoveryManager, ShardMapManager};
pub use mapper::{DefaultShardMap, ListShardMap, LsmConnector, Mapper, MapperError, RangeShardMap};
pub use retry::RetryingStore;

pub use shardmgr_config::{Credential, CredentialProvider, RetryPolicy, StaticCredential, StoreConnectionString, StoreVersion};

/// Aggregates every error this crate's public API can return, so a
/// caller that doesn't need to distinguish GSM faults from operation
/// faults from key-algebra faults can match one type (spec.md's ambient
/// error-handling section, §2 "Ambient stack"). Any narrower error
/// (e.g. [`mapper::MapperError`]) converts into this with `?`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error(transparent)]
    Connection(#[from] ConnectionBuilderError),

    #[error(transparent)]
    Key(#[from] key::KeyError),

    #[error(transparent)]
    Store(#[from] store::StoreError),
}
