//! Shard map entities: `ShardMap`, `Shard`, `Mapping`, and their supporting
//! value types (spec.md §4.F).

mod error;
mod location;
mod lock_owner;
mod mapping;
mod shard;
mod shard_map;

pub use error::ShardMapConversionError;
pub use location::{ShardLocation, ShardProtocol};
pub use lock_owner::LockOwnerId;
pub use mapping::{Mapping, MappingKey, MappingStatus};
pub use shard::{Shard, ShardStatus};
pub use shard_map::{ShardMap, ShardMapKind};
