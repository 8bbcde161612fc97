use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shardmgr_config::StoreVersion;

use crate::entities::{LockOwnerId, MappingStatus, ShardLocation, ShardMapKind, ShardStatus};
use crate::key::ShardKeyType;

/// Wire representation of a [`crate::entities::ShardMap`], as sent to and
/// received from a stored procedure (spec.md §4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardMapEntity {
    pub id: Uuid,
    pub name: String,
    pub kind: ShardMapKind,
    pub key_kind: ShardKeyType,
}

/// Wire representation of a [`crate::entities::Shard`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardEntity {
    pub id: Uuid,
    pub shard_map_id: Uuid,
    pub version: Uuid,
    pub location: ShardLocation,
    pub status: ShardStatus,
}

/// Wire representation of a [`crate::entities::Mapping`]. `max_value`
/// absent means a point mapping (list map); present means a range
/// mapping, with `None` inside meaning the range's high bound is the
/// `+∞` sentinel (spec.md §4.A, §4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingEntity {
    pub id: Uuid,
    pub shard_map_id: Uuid,
    pub shard_id: Uuid,
    pub key_kind: ShardKeyType,
    pub min_value: Vec<u8>,
    pub max_value: Option<Option<Vec<u8>>>,
    pub status: MappingStatus,
    pub lock_owner_id: LockOwnerId,
}

/// A single mutation within a bulk mapping operation payload. Multiple
/// steps run in declared order, inside one transaction, within a single
/// phase of the operation state machine (spec.md §4.E "Bulk step
/// format").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkStep {
    pub id: u32,
    pub kind: BulkStepKind,
    pub mapping: MappingEntity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BulkStepKind {
    Remove = 1,
    Update = 2,
    Add = 3,
}

/// The shard-management analogue of [`BulkStep`]: add/remove/update one
/// shard row as part of a two-phase shard operation (spec.md §6, Shards
/// (GSM) group — `BulkOperationShardsGlobalBegin`/`...End`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardBulkStep {
    pub id: u32,
    pub kind: BulkStepKind,
    pub shard: ShardEntity,
}

/// Which mappings a `LockOrUnlockShardMappingsGlobal` call affects
/// (spec.md §4.E "Lock protocol"; operation codes 2/3 added by the 1.2
/// upgrade, §9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockScope {
    /// A single mapping, identified by `Payload::mapping`.
    One,
    /// Every mapping in one shard map.
    AllInShardMap,
    /// Every mapping currently held by `Payload::lock_owner_id`.
    AllForOwner,
}

/// A named, opaque schema-info blob (spec.md §3 "Schema Info", §6
/// "SchemaInfo" rowset). The core never inspects `schema`; it is round-
/// tripped for an external data-movement tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfoEntity {
    pub name: String,
    pub schema: serde_json::Value,
}

/// Wire form of the durable operation-log row an in-flight two-phase
/// operation writes to the GSM (spec.md §3 "Operation Log Entry", §6
/// `OperationsLogGlobal`). `code` is [`crate::operation::OperationCode`]
/// serialized as its `Debug` name — the store treats it opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLogPayload {
    pub operation_id: Uuid,
    pub code: String,
    pub data: serde_json::Value,
    pub undo_start_state: u8,
    pub shard_version_removes: Vec<Uuid>,
    pub shard_version_adds: Vec<Uuid>,
}

/// Arguments passed to a stored procedure call. Every procedure takes a
/// subset of these; unused fields are left at their defaults (spec.md
/// §4.B, §4.D).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payload {
    pub store_version: Option<StoreVersion>,
    pub shard_map: Option<ShardMapEntity>,
    pub shard: Option<ShardEntity>,
    pub mapping: Option<MappingEntity>,
    /// A full mapping set, used by `ReplaceShardMappingsGlobal` and the
    /// attach/detach recovery calls (spec.md §4.I).
    pub mappings: Vec<MappingEntity>,
    pub lock_owner_id: Option<LockOwnerId>,
    pub lock_scope: Option<LockScope>,
    pub operation_id: Option<Uuid>,
    pub bulk_steps: Vec<BulkStep>,
    pub shard_bulk_steps: Vec<ShardBulkStep>,
    pub shard_map_name: Option<String>,
    pub key: Option<Vec<u8>>,
    pub location: Option<ShardLocation>,
    pub schema_info: Option<SchemaInfoEntity>,
    pub log_entry: Option<OperationLogPayload>,
    /// Whether the GSM side of a bulk-add step should check for overlap
    /// against existing readable mappings (spec.md §4.E "Bulk step
    /// format" — validation is optional per step).
    pub validate: bool,
}

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }
}
