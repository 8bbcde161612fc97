//! Store abstractions: a `Store` is either the GSM or one shard's LSM
//! (spec.md §4.B). `StoreConnection`/`TransactionScope` wrap a `Store`
//! trait object so the operation engine (`crate::operation`) can hold a
//! GSM handle and any number of LSM handles uniformly, without
//! monomorphizing over which concrete backend each one is.

mod connection;
mod convert;
mod error;
mod fake_store;
mod payload;
mod pg_store;
mod procedure;
mod result_code;
mod rowset;
mod trait_def;
mod transaction;

pub use connection::StoreConnection;
pub use error::{classify_postgres_error, StoreError};
pub use fake_store::FakeStore;
pub use payload::{
    BulkStep, BulkStepKind, LockScope, MappingEntity, OperationLogPayload, Payload,
    SchemaInfoEntity, ShardBulkStep, ShardEntity, ShardMapEntity,
};
pub use pg_store::PgStore;
pub use procedure::{StoredProcedure, TransactionKind};
pub use result_code::ResultCode;
pub use rowset::{OperationLogEntry, RowsetKind, SchemaInfo, StoreCallResult, StoreResults};
pub use trait_def::Store;
pub use transaction::TransactionScope;
