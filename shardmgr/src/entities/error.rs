use thiserror::Error;

use super::shard_map::ShardMapKind;
use crate::key::ShardKeyType;

/// Raised when downcasting a [`super::ShardMap`] to a typed
/// list/range/default view and the stored kind doesn't match what the
/// caller asked for (spec.md §4.F).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShardMapConversionError {
    #[error("shard map \"{name}\" is a {actual:?} map, not a {expected:?} map")]
    KindMismatch {
        name: String,
        expected: ShardMapKind,
        actual: ShardMapKind,
    },

    #[error("shard map \"{name}\" is keyed by {actual:?}, not {expected:?}")]
    KeyKindMismatch {
        name: String,
        expected: ShardKeyType,
        actual: ShardKeyType,
    },
}
