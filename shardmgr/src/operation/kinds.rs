use serde::{Deserialize, Serialize};

/// Which mutation an operation log entry records (spec.md §3 "Operation
/// Log Entry"). Serialized as its `Debug` name into
/// [`crate::store::OperationLogPayload::code`] — the store treats it
/// opaquely, it exists for a human or the recovery manager reading the
/// log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationCode {
    AddMapping,
    RemoveMapping,
    UpdateMapping,
    SplitMapping,
    MergeMapping,
    RelocateMapping,
    AddShard,
    RemoveShard,
}

impl OperationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddMapping => "AddMapping",
            Self::RemoveMapping => "RemoveMapping",
            Self::UpdateMapping => "UpdateMapping",
            Self::SplitMapping => "SplitMapping",
            Self::MergeMapping => "MergeMapping",
            Self::RelocateMapping => "RelocateMapping",
            Self::AddShard => "AddShard",
            Self::RemoveShard => "RemoveShard",
        }
    }

    /// Whether this operation's mapping mutation touches a second shard
    /// (spec.md §4.E: split/merge/relocate run a `DoLocalTarget` phase
    /// that add/remove/update mapping operations skip).
    pub fn has_target_shard(self) -> bool {
        matches!(self, Self::SplitMapping | Self::MergeMapping | Self::RelocateMapping)
    }
}
