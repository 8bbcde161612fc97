use tracing::warn;

use super::error::StoreError;
use super::payload::Payload;
use super::procedure::{StoredProcedure, TransactionKind};
use super::rowset::StoreCallResult;
use super::trait_def::Store;

/// A named transaction scope over a [`Store`] (spec.md §4.B
/// "TransactionScope"). Each call made through it is already atomic on
/// its own; the scope's only job is to tag calls with a [`TransactionKind`]
/// and to catch the case where the caller exits without calling
/// [`TransactionScope::commit`], which would silently discard a pending
/// bulk operation the caller believed had landed.
pub struct TransactionScope<'a> {
    store: &'a dyn Store,
    kind: TransactionKind,
    committed: bool,
}

impl<'a> TransactionScope<'a> {
    pub(super) fn new(store: &'a dyn Store, kind: TransactionKind) -> Self {
        Self {
            store,
            kind,
            committed: false,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub async fn execute(
        &mut self,
        procedure: StoredProcedure,
        payload: Payload,
    ) -> Result<StoreCallResult, StoreError> {
        self.store.execute_operation(self.kind, procedure, payload).await
    }

    pub async fn execute_batch(
        &mut self,
        commands: Vec<(StoredProcedure, Payload)>,
    ) -> Result<Vec<StoreCallResult>, StoreError> {
        self.store.execute_command_batch(self.kind, commands).await
    }

    /// Marks the scope as done. Every call already committed itself as
    /// it ran; this only silences the drop-time warning.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl<'a> Drop for TransactionScope<'a> {
    fn drop(&mut self) {
        if !self.committed {
            warn!(kind = ?self.kind, "transaction scope dropped without commit()");
        }
    }
}
