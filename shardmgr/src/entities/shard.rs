use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::ShardLocation;

/// Per-shard online/offline flag (`ShardsGlobal.Status`, spec.md §6). A
/// shard taken offline is still routable to by key (routing only checks
/// mapping status) but administrative tooling can use this to drain one
/// before detaching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardStatus {
    Online,
    Offline,
}

/// A single physical database, reached at `location`, belonging to
/// exactly one shard map (spec.md §3 `Shard`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub id: Uuid,
    pub shard_map_id: Uuid,
    pub location: ShardLocation,
    /// Opaque identity stamped once at creation. The GSM store surface
    /// (`BulkStepKind::Update` on a `ShardBulkStep`, `ResultCode::
    /// ShardVersionMismatch`) supports optimistic concurrency keyed on
    /// this field for callers that update a shard row directly, but no
    /// mapper operation in this crate updates a shard in place today:
    /// mapping mutations go through `BulkOperationShardMappings*`
    /// instead, which never touches `ShardsGlobal.Version`.
    pub version: Uuid,
    pub status: ShardStatus,
}

impl Shard {
    pub fn new(shard_map_id: Uuid, location: ShardLocation) -> Self {
        Self {
            id: Uuid::new_v4(),
            shard_map_id,
            location,
            version: Uuid::new_v4(),
            status: ShardStatus::Online,
        }
    }
}
