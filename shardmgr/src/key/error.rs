use thiserror::Error;

use super::kind::ShardKeyType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("cannot compare a {left:?} key to a {right:?} key")]
    KindMismatch {
        left: ShardKeyType,
        right: ShardKeyType,
    },

    #[error("the +inf sentinel has no successor")]
    NoSuccessor,

    #[error("range [{low}, {high}) is empty or inverted")]
    InvalidRange { low: String, high: String },

    #[error("range endpoints are of different key kinds: {low:?} vs {high:?}")]
    RangeKindMismatch {
        low: ShardKeyType,
        high: ShardKeyType,
    },
}
