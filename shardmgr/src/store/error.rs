use thiserror::Error;
use uuid::Uuid;

use super::result_code::ResultCode;

/// Errors a [`super::Store`] implementation can raise. Classified into
/// transient / semantic / fatal per spec.md §7; the retry wrapper
/// (Component J) only ever retries [`StoreError::Transient`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A semantic fault: the stored operation ran and returned a non-success
    /// result code. Carries the offending shard map name and/or shard
    /// location when known, as spec.md §7 requires.
    #[error("store returned {code:?} ({}){}", code.code(), context.as_ref().map(|c| format!(": {c}")).unwrap_or_default())]
    Semantic {
        code: ResultCode,
        context: Option<String>,
    },

    /// A transient SQL fault: connection broken, deadlock, login timeout,
    /// throttling, service busy, or a wait/semaphore expiry. Safe to
    /// retry (spec.md §4.J).
    #[error("transient store fault: {0}")]
    Transient(String),

    /// A fatal store error: schema corruption, failed upgrade. Never
    /// retried.
    #[error("fatal store error: {0}")]
    Fatal(String),

    /// Connection string, credential, or transport failure below the
    /// stored-procedure layer.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation log entry {0} not found")]
    OperationLogEntryNotFound(Uuid),
}

impl StoreError {
    pub fn semantic(code: ResultCode) -> Self {
        Self::Semantic {
            code,
            context: None,
        }
    }

    pub fn semantic_with(code: ResultCode, context: impl Into<String>) -> Self {
        Self::Semantic {
            code,
            context: Some(context.into()),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Semantic { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this looks like "the `__ShardManagement` schema hasn't
    /// been provisioned yet" rather than a real fault — the schema
    /// pipeline's `checkIfExists` tolerates this and treats the store as
    /// version zero (spec.md §4.C).
    pub fn is_missing_schema(&self) -> bool {
        matches!(self, Self::Fatal(msg) if msg.contains("does not exist"))
    }
}

/// Classifies a raw `tokio_postgres` error as transient or not, per the
/// SQL error numbers spec.md §4.J names: connection broken, deadlock,
/// login timeout, throttling, service busy, or wait/semaphore expiry.
pub fn classify_postgres_error(err: &tokio_postgres::Error) -> bool {
    use tokio_postgres::error::SqlState;

    if err.is_closed() {
        return true;
    }

    match err.code() {
        Some(state) => matches!(
            *state,
            SqlState::T_R_DEADLOCK_DETECTED
                | SqlState::T_R_SERIALIZATION_FAILURE
                | SqlState::T_R_LOCK_NOT_AVAILABLE
                | SqlState::CONNECTION_EXCEPTION
                | SqlState::CONNECTION_DOES_NOT_EXIST
                | SqlState::CONNECTION_FAILURE
                | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
                | SqlState::TOO_MANY_CONNECTIONS
                | SqlState::ADMIN_SHUTDOWN
                | SqlState::CRASH_SHUTDOWN
                | SqlState::CANNOT_CONNECT_NOW
        ),
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_semantic_carries_code() {
        let err = StoreError::semantic(ResultCode::MappingLockOwnerIdMismatch);
        assert_eq!(err.result_code(), Some(ResultCode::MappingLockOwnerIdMismatch));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_flagged() {
        let err = StoreError::Transient("deadlock".into());
        assert!(err.is_transient());
        assert_eq!(err.result_code(), None);
    }
}
