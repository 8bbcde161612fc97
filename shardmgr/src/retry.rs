//! Wraps a [`Store`] with the exponential-backoff retry policy every
//! store call is subject to (spec.md §4.J). DDR connections opened for
//! routing are deliberately *not* wrapped here (spec.md §5 "Resource
//! ownership") — only GSM/LSM stored-procedure calls go through this.

use async_trait::async_trait;
use tracing::warn;

use shardmgr_config::RetryPolicy;

use crate::store::{Payload, Store, StoreCallResult, StoreError, StoredProcedure, TransactionKind};

/// A [`Store`] decorator that retries a call on [`StoreError::Transient`]
/// up to `policy.max_attempts` times, sleeping `policy.delay_for` between
/// attempts. Any other error — semantic, fatal, or connection — passes
/// through on the first attempt (spec.md §4.J, §7).
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Store> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(attempt, ?delay, error = %err, "transient store fault, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<S: Store> Store for RetryingStore<S> {
    async fn execute_operation(
        &self,
        kind: TransactionKind,
        procedure: StoredProcedure,
        payload: Payload,
    ) -> Result<StoreCallResult, StoreError> {
        self.with_retry(|| self.inner.execute_operation(kind, procedure, payload.clone()))
            .await
    }

    async fn execute_command_batch(
        &self,
        kind: TransactionKind,
        commands: Vec<(StoredProcedure, Payload)>,
    ) -> Result<Vec<StoreCallResult>, StoreError> {
        self.with_retry(|| self.inner.execute_command_batch(kind, commands.clone()))
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::ResultCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyStore {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn execute_operation(
            &self,
            _kind: TransactionKind,
            _procedure: StoredProcedure,
            _payload: Payload,
        ) -> Result<StoreCallResult, StoreError> {
            if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
                Err(StoreError::Transient("connection reset".into()))
            } else {
                Ok(StoreCallResult::success(Default::default()))
            }
        }

        async fn execute_command_batch(
            &self,
            _kind: TransactionKind,
            _commands: Vec<(StoredProcedure, Payload)>,
        ) -> Result<Vec<StoreCallResult>, StoreError> {
            unimplemented!()
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let store = RetryingStore::new(
            FlakyStore {
                failures_left: AtomicU32::new(2),
            },
            fast_policy(5),
        );
        let result = store
            .execute_operation(TransactionKind::Global, StoredProcedure::GetStoreVersionGlobal, Payload::empty())
            .await
            .unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = RetryingStore::new(
            FlakyStore {
                failures_left: AtomicU32::new(10),
            },
            fast_policy(3),
        );
        let err = store
            .execute_operation(TransactionKind::Global, StoredProcedure::GetStoreVersionGlobal, Payload::empty())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_semantic_error_not_retried() {
        struct AlwaysSemantic;
        #[async_trait]
        impl Store for AlwaysSemantic {
            async fn execute_operation(
                &self,
                _kind: TransactionKind,
                _procedure: StoredProcedure,
                _payload: Payload,
            ) -> Result<StoreCallResult, StoreError> {
                Err(StoreError::semantic(ResultCode::MappingDoesNotExist))
            }
            async fn execute_command_batch(
                &self,
                _kind: TransactionKind,
                _commands: Vec<(StoredProcedure, Payload)>,
            ) -> Result<Vec<StoreCallResult>, StoreError> {
                unimplemented!()
            }
        }

        let store = RetryingStore::new(AlwaysSemantic, fast_policy(5));
        let err = store
            .execute_operation(TransactionKind::Global, StoredProcedure::GetStoreVersionGlobal, Payload::empty())
            .await
            .unwrap_err();
        assert_eq!(err.result_code(), Some(ResultCode::MappingDoesNotExist));
    }
}
