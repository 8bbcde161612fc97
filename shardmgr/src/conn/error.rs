use thiserror::Error;

use shardmgr_config::CredentialError;

#[derive(Debug, Error)]
pub enum ConnectionBuilderError {
    #[error("{0} cannot be supplied by the caller; it is set from the resolved shard")]
    DisallowedField(&'static str),

    #[error("ConnectRetryCount > 1 would hide a mapping switch behind client-side reconnect")]
    ClientSideReconnect,

    #[error("failed to resolve credentials: {0}")]
    Credential(#[from] CredentialError),
}
