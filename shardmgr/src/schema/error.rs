use thiserror::Error;

use shardmgr_config::StoreVersion;

use crate::store::{ResultCode, StoreError};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("upgrade step {from} -> {to} was rejected: {code:?}")]
    UpgradeRejected {
        from: StoreVersion,
        to: StoreVersion,
        code: ResultCode,
    },
}
