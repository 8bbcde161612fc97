use thiserror::Error;
use uuid::Uuid;

use crate::entities::ShardMapConversionError;
use crate::key::KeyError;
use crate::operation::OperationError;
use crate::store::{ResultCode, StoreError};

/// Errors the mapper (spec.md §4.G) can raise: GSM/LSM faults, a key or
/// range that violates the key algebra's invariants, a failed two-phase
/// operation, or a typed-view downcast mismatch.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Conversion(#[from] ShardMapConversionError),

    #[error("no mapping covers the requested key in shard map \"{shard_map}\"")]
    NoMappingForKey { shard_map: String },

    #[error("mapping {mapping_id} failed validation on its shard: {code:?}")]
    ValidationFailed { mapping_id: Uuid, code: ResultCode },

    #[error("shard map \"{0}\" does not exist")]
    ShardMapNotFound(String),

    #[error("no LSM connector registered for shard {0}")]
    NoLsmConnector(Uuid),

    #[error("mappings {left} and {right} are on different shards and cannot be merged")]
    MappingsNotOnSameShard { left: Uuid, right: Uuid },
}
