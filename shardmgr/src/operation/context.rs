use uuid::Uuid;

use crate::store::{BulkStep, ShardBulkStep, StoreConnection};

use super::kinds::OperationCode;

/// The row-level mutation an operation applies, in its forward form and
/// its inverse (used by the undo chain, spec.md §4.E "Failure
/// semantics"). Mapping operations carry [`BulkStep`]s against
/// `BulkOperationShardMappingsGlobal{Begin,End}`/`...Local`; shard
/// add/remove carry [`ShardBulkStep`]s against
/// `BulkOperationShardsGlobal{Begin,End}` and never touch an LSM.
pub enum OperationSteps {
    Mapping {
        forward: Vec<BulkStep>,
        undo: Vec<BulkStep>,
    },
    Shard {
        forward: Vec<ShardBulkStep>,
        undo: Vec<ShardBulkStep>,
    },
}

/// Everything one run of the engine needs: which store connections to
/// call, which rows to mutate and how to undo that mutation, and the
/// operation's identity for logging and reentrancy (spec.md §4.E).
pub struct OperationContext {
    pub op_id: Uuid,
    pub code: OperationCode,
    pub gsm: StoreConnection,
    /// LSM of the shard the mapping currently lives on (or the shard
    /// being added/removed, for shard operations).
    pub lsm_source: Option<StoreConnection>,
    /// LSM of the destination shard for split/merge/relocate; `None`
    /// for every other operation kind (spec.md §4.E).
    pub lsm_target: Option<StoreConnection>,
    pub steps: OperationSteps,
}

impl OperationContext {
    pub fn has_target_phase(&self) -> bool {
        self.lsm_target.is_some()
    }
}
