use std::sync::Arc;

use super::error::StoreError;
use super::payload::Payload;
use super::procedure::{StoredProcedure, TransactionKind};
use super::rowset::StoreCallResult;
use super::trait_def::Store;
use super::transaction::TransactionScope;

/// A handle to one GSM or LSM backend. Cheap to clone; every clone shares
/// the same underlying [`Store`] (spec.md §4.B "StoreConnection"). Holds
/// a trait object rather than a generic `S: Store` so the operation
/// engine (`crate::operation`) can keep one GSM connection and an
/// arbitrary number of LSM connections — possibly backed by different
/// `Store` impls, e.g. a real shard next to a `FakeStore` in a test —
/// side by side in one collection.
#[derive(Clone)]
pub struct StoreConnection {
    store: Arc<dyn Store>,
}

impl StoreConnection {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Opens a named transaction scope. Nothing is sent over the wire
    /// until the first call through the returned scope; the scope exists
    /// to tag subsequent calls with a [`TransactionKind`] and to warn if
    /// the caller forgets to [`TransactionScope::commit`] (spec.md §4.B).
    pub fn begin_transaction(&self, kind: TransactionKind) -> TransactionScope<'_> {
        TransactionScope::new(self.store.as_ref(), kind)
    }

    /// Runs a single stored procedure directly, outside any named scope.
    /// Used for read-only lookups that don't need transaction framing.
    pub async fn execute(
        &self,
        kind: TransactionKind,
        procedure: StoredProcedure,
        payload: Payload,
    ) -> Result<StoreCallResult, StoreError> {
        self.store.execute_operation(kind, procedure, payload).await
    }
}
