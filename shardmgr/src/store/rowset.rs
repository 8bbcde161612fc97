use shardmgr_config::StoreVersion;

use crate::entities::{Mapping, Shard, ShardLocation, ShardMap};

use super::payload::{OperationLogPayload, SchemaInfoEntity};
use super::result_code::ResultCode;

/// The seven rowset kinds a stored procedure can hand back (spec.md §6).
/// Which ones are populated on a given call depends on the procedure; a
/// non-success [`ResultCode`] usually means every rowset is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsetKind {
    ShardMap,
    Shard,
    ShardMapping,
    ShardLocation,
    StoreVersion,
    Operation,
    SchemaInfo,
}

/// One row of the operation log, as read back from the GSM (spec.md §3
/// "Operation Log Entry", §6). Reuses the same shape the engine writes
/// ([`OperationLogPayload`]) — the store never interprets `code` or
/// `data`, only persists and returns them.
pub type OperationLogEntry = OperationLogPayload;

/// A named, opaque schema-info row (spec.md §6 "SchemaInfo" rowset).
pub type SchemaInfo = SchemaInfoEntity;

/// Everything a single stored-procedure call returns: a [`ResultCode`],
/// zero or more populated rowsets, and the store's schema version echoed
/// back so the caller can detect drift without a separate round trip
/// (spec.md §4.B, §6).
#[derive(Debug, Clone, Default)]
pub struct StoreResults {
    pub shard_maps: Vec<ShardMap>,
    pub shards: Vec<Shard>,
    pub mappings: Vec<Mapping>,
    pub locations: Vec<ShardLocation>,
    pub store_version: Option<StoreVersion>,
    pub operations: Vec<OperationLogEntry>,
    pub schema_info: Vec<SchemaInfo>,
}

impl StoreResults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_shard_maps(shard_maps: Vec<ShardMap>) -> Self {
        Self {
            shard_maps,
            ..Self::default()
        }
    }

    pub fn with_shards(shards: Vec<Shard>) -> Self {
        Self {
            shards,
            ..Self::default()
        }
    }

    pub fn with_mappings(mappings: Vec<Mapping>) -> Self {
        Self {
            mappings,
            ..Self::default()
        }
    }
}

/// Pairs a [`ResultCode`] with the rowsets returned alongside it. Kept
/// distinct from [`StoreResults`] so a `Store` impl can construct the
/// rowsets once and let the caller decide, via `code`, whether to trust
/// them (spec.md §4.B).
#[derive(Debug, Clone)]
pub struct StoreCallResult {
    pub code: ResultCode,
    pub results: StoreResults,
}

impl StoreCallResult {
    pub fn success(results: StoreResults) -> Self {
        Self {
            code: ResultCode::Success,
            results,
        }
    }

    pub fn failure(code: ResultCode) -> Self {
        Self {
            code,
            results: StoreResults::empty(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}
