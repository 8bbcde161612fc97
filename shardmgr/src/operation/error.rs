use thiserror::Error;
use uuid::Uuid;

use crate::store::{ResultCode, StoreError};

use super::state::OperationState;

/// Failure of a two-phase operation, either while driving it forward or
/// while unwinding it (spec.md §4.E "Failure semantics").
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("operation {op_id} failed in {state:?}: {source}")]
    Store {
        op_id: Uuid,
        state: OperationState,
        #[source]
        source: StoreError,
    },

    /// A step's store call succeeded but returned a non-success result
    /// code (e.g. `RangeAlreadyMapped`): the operation never committed
    /// and nothing needs undoing beyond what that step itself already
    /// rejected.
    #[error("operation {op_id} rejected in {state:?}: {code:?}")]
    Rejected {
        op_id: Uuid,
        state: OperationState,
        code: ResultCode,
    },

    /// The undo chain itself failed after a forward step failed — the
    /// GSM and/or an LSM may now disagree with each other until the
    /// recovery manager's next pass reconciles them (spec.md §4.I).
    #[error("operation {op_id} failed in {failed_in:?} and undo failed in {undo_failed_in:?}: {source}")]
    UndoFailed {
        op_id: Uuid,
        failed_in: OperationState,
        undo_failed_in: OperationState,
        #[source]
        source: StoreError,
    },
}

impl OperationError {
    pub fn op_id(&self) -> Uuid {
        match self {
            Self::Store { op_id, .. } | Self::Rejected { op_id, .. } | Self::UndoFailed { op_id, .. } => *op_id,
        }
    }
}
