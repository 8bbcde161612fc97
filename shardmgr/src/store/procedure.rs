/// Names every stored procedure a [`super::Store`] can be asked to run.
/// These mirror the GSM/LSM procedure catalog (spec.md §4.B, §4.E, §6):
/// CRUD on shard maps/shards/mappings, the per-phase operation steps,
/// recovery, schema-info, and schema/version queries. 26 operations,
/// grouped as in spec.md §6's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoredProcedure {
    /// `GetStoreVersionHelper`
    GetStoreVersionGlobal,
    GetStoreVersionLocal,

    // Shard maps (GSM)
    GetShardMapsGlobal,
    FindShardMapByNameGlobal,
    GetAllDistinctShardLocationsGlobal,
    AddShardMapGlobal,
    RemoveShardMapGlobal,

    // Shards (GSM) — mutations go through the bulk begin/end pair so a
    // shard add/remove is itself a two-phase operation engine step
    // (spec.md §4.E), not a one-shot RPC.
    GetShardsGlobal,
    FindShardByLocationGlobal,
    BulkOperationShardsGlobalBegin,
    BulkOperationShardsGlobalEnd,

    // Mappings (GSM)
    GetAllMappingsGlobal,
    FindMappingByKeyGlobal,
    FindShardMappingByIdGlobal,
    BulkOperationShardMappingsGlobalBegin,
    BulkOperationShardMappingsGlobalEnd,
    LockOrUnlockMappingsGlobal,

    // Schema info (GSM)
    GetAllShardingSchemaInfosGlobal,
    FindShardingSchemaInfoByNameGlobal,
    AddShardingSchemaInfoGlobal,
    RemoveShardingSchemaInfoGlobal,
    UpdateShardingSchemaInfoGlobal,

    // Recovery (GSM)
    AttachShardGlobal,
    DetachShardGlobal,
    ReplaceShardMappingsGlobal,
    FindAndUpdateOperationLogEntryByIdGlobal,

    // LSM
    GetAllShardsLocal,
    ValidateShardLocal,
    AddShardLocal,
    RemoveShardLocal,
    UpdateShardLocal,
    GetAllShardMappingsLocal,
    FindShardMappingByKeyLocal,
    ValidateMappingLocal,
    BulkOperationShardMappingsLocal,
    KillSessionsForShardMappingLocal,

    UpgradeStoreGlobal,
    UpgradeStoreLocal,
}

/// Which physical store a call targets and, for local stores, which side
/// of a two-phase operation it participates in (spec.md §4.B). The
/// transaction each value implies is opened and closed inside a single
/// [`super::Store`] call; it never spans multiple calls. `NonTransactional`
/// is required for `KillSessionsForShardMappingLocal`, which cannot run
/// inside a transaction (spec.md §4.B, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Global,
    LocalSource,
    LocalTarget,
    NonTransactional,
}

impl TransactionKind {
    pub fn is_transactional(self) -> bool {
        !matches!(self, Self::NonTransactional)
    }
}
