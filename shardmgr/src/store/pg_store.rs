use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{error, warn};

use shardmgr_config::StoreVersion;

use super::convert::{push_mapping, push_shard, push_shard_map};
use super::error::{classify_postgres_error, StoreError};
use super::payload::{MappingEntity, Payload, ShardEntity, ShardMapEntity};
use super::procedure::{StoredProcedure, TransactionKind};
use super::result_code::ResultCode;
use super::rowset::{OperationLogEntry, SchemaInfo, StoreCallResult, StoreResults};
use super::trait_def::Store;

/// Postgres-backed [`Store`]. Every GSM/LSM stored procedure is deployed
/// as a single plpgsql function, `shardmgr_call(procedure text, payload
/// jsonb) returns jsonb`, that dispatches internally and returns one
/// JSON document shaped like [`RawResponse`] — this keeps the wire
/// surface to one prepared statement regardless of which procedure is
/// invoked, while still giving each procedure its own transaction
/// (spec.md §4.B).
pub struct PgStore {
    client: Client,
    _connection_task: JoinHandle<()>,
}

/// Shape of the JSON document `shardmgr_call` returns: a result code plus
/// whichever wire-format rowsets (spec.md §6) the invoked procedure
/// populates. Wire entities, not domain types, because the function
/// speaks JSON-compatible scalars; [`convert`](super::convert) turns
/// each populated rowset into the matching [`crate::entities`] type.
#[derive(Debug, Deserialize)]
struct RawResponse {
    code: u16,
    #[serde(default)]
    shard_maps: Vec<ShardMapEntity>,
    #[serde(default)]
    shards: Vec<ShardEntity>,
    #[serde(default)]
    mappings: Vec<MappingEntity>,
    #[serde(default)]
    store_version: Option<StoreVersion>,
    #[serde(default)]
    operations: Vec<OperationLogEntry>,
    #[serde(default)]
    schema_info: Vec<SchemaInfo>,
}

impl RawResponse {
    fn into_results(self) -> StoreResults {
        let mut results = StoreResults::empty();
        for entity in self.shard_maps {
            push_shard_map(&mut results, entity);
        }
        for entity in self.shards {
            push_shard(&mut results, entity);
        }
        for entity in self.mappings {
            push_mapping(&mut results, entity);
        }
        results.store_version = self.store_version;
        results.operations = self.operations;
        results.schema_info = self.schema_info;
        results
    }
}

impl PgStore {
    /// Opens a connection to a GSM or LSM database. `conn_string` is a
    /// libpq keyword/value string (`host=... user=... dbname=...`), the
    /// same format [`shardmgr_config::StoreConnectionString`] parses and
    /// [`crate::conn`] builds for data-dependent routing.
    pub async fn connect(conn_string: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(conn_string, NoTls)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "store connection closed with error");
            }
        });

        Ok(Self {
            client,
            _connection_task: task,
        })
    }

    async fn call_one(
        &self,
        procedure: StoredProcedure,
        payload: &Payload,
    ) -> Result<StoreCallResult, StoreError> {
        let name = procedure_name(procedure);
        let body = serde_json::to_value(payload)
            .map_err(|e| StoreError::Fatal(format!("encoding payload for {name}: {e}")))?;

        let row = self
            .client
            .query_one("SELECT shardmgr_call($1, $2) AS response", &[&name, &body])
            .await
            .map_err(|e| {
                if classify_postgres_error(&e) {
                    StoreError::Transient(e.to_string())
                } else {
                    StoreError::Fatal(e.to_string())
                }
            })?;

        let raw: serde_json::Value = row.get("response");
        let response: RawResponse = serde_json::from_value(raw)
            .map_err(|e| StoreError::Fatal(format!("decoding response from {name}: {e}")))?;

        let code = decode_result_code(response.code)?;
        Ok(StoreCallResult {
            code,
            results: response.into_results(),
        })
    }
}

fn decode_result_code(raw: u16) -> Result<ResultCode, StoreError> {
    // `ResultCode` is `#[repr(u16)]` over exactly the taxonomy in spec.md
    // §6; anything else means the deployed function is out of sync with
    // this client.
    const CODES: &[ResultCode] = &[
        ResultCode::Success,
        ResultCode::MissingParameters,
        ResultCode::StoreVersionMismatch,
        ResultCode::ShardPendingOperation,
        ResultCode::UnexpectedStoreError,
        ResultCode::ShardMapAlreadyExists,
        ResultCode::ShardMapDoesNotExist,
        ResultCode::ShardMapHasShards,
        ResultCode::ShardExists,
        ResultCode::ShardDoesNotExist,
        ResultCode::ShardHasMappings,
        ResultCode::ShardVersionMismatch,
        ResultCode::ShardLocationAlreadyExists,
        ResultCode::MappingDoesNotExist,
        ResultCode::RangeAlreadyMapped,
        ResultCode::PointAlreadyMapped,
        ResultCode::MappingNotFoundForKey,
        ResultCode::UnableToKillSessions,
        ResultCode::MappingIsNotOffline,
        ResultCode::MappingLockOwnerIdMismatch,
        ResultCode::MappingAlreadyLocked,
        ResultCode::MappingIsOffline,
        ResultCode::SchemaInfoNameDoesNotExist,
        ResultCode::SchemaInfoNameConflict,
    ];

    CODES
        .iter()
        .copied()
        .find(|c| c.code() == raw)
        .ok_or_else(|| StoreError::Fatal(format!("unknown result code {raw}")))
}

fn procedure_name(procedure: StoredProcedure) -> &'static str {
    match procedure {
        StoredProcedure::GetStoreVersionGlobal => "get_store_version_global",
        StoredProcedure::GetStoreVersionLocal => "get_store_version_local",

        StoredProcedure::GetShardMapsGlobal => "get_shard_maps_global",
        StoredProcedure::FindShardMapByNameGlobal => "find_shard_map_by_name_global",
        StoredProcedure::GetAllDistinctShardLocationsGlobal => "get_all_distinct_shard_locations_global",
        StoredProcedure::AddShardMapGlobal => "add_shard_map_global",
        StoredProcedure::RemoveShardMapGlobal => "remove_shard_map_global",

        StoredProcedure::GetShardsGlobal => "get_shards_global",
        StoredProcedure::FindShardByLocationGlobal => "find_shard_by_location_global",
        StoredProcedure::BulkOperationShardsGlobalBegin => "bulk_operation_shards_global_begin",
        StoredProcedure::BulkOperationShardsGlobalEnd => "bulk_operation_shards_global_end",

        StoredProcedure::GetAllMappingsGlobal => "get_all_mappings_global",
        StoredProcedure::FindMappingByKeyGlobal => "find_mapping_by_key_global",
        StoredProcedure::FindShardMappingByIdGlobal => "find_shard_mapping_by_id_global",
        StoredProcedure::BulkOperationShardMappingsGlobalBegin => "bulk_operation_shard_mappings_global_begin",
        StoredProcedure::BulkOperationShardMappingsGlobalEnd => "bulk_operation_shard_mappings_global_end",
        StoredProcedure::LockOrUnlockMappingsGlobal => "lock_or_unlock_mappings_global",

        StoredProcedure::GetAllShardingSchemaInfosGlobal => "get_all_sharding_schema_infos_global",
        StoredProcedure::FindShardingSchemaInfoByNameGlobal => "find_sharding_schema_info_by_name_global",
        StoredProcedure::AddShardingSchemaInfoGlobal => "add_sharding_schema_info_global",
        StoredProcedure::RemoveShardingSchemaInfoGlobal => "remove_sharding_schema_info_global",
        StoredProcedure::UpdateShardingSchemaInfoGlobal => "update_sharding_schema_info_global",

        StoredProcedure::AttachShardGlobal => "attach_shard_global",
        StoredProcedure::DetachShardGlobal => "detach_shard_global",
        StoredProcedure::ReplaceShardMappingsGlobal => "replace_shard_mappings_global",
        StoredProcedure::FindAndUpdateOperationLogEntryByIdGlobal => "find_and_update_operation_log_entry_by_id_global",

        StoredProcedure::GetAllShardsLocal => "get_all_shards_local",
        StoredProcedure::ValidateShardLocal => "validate_shard_local",
        StoredProcedure::AddShardLocal => "add_shard_local",
        StoredProcedure::RemoveShardLocal => "remove_shard_local",
        StoredProcedure::UpdateShardLocal => "update_shard_local",
        StoredProcedure::GetAllShardMappingsLocal => "get_all_shard_mappings_local",
        StoredProcedure::FindShardMappingByKeyLocal => "find_shard_mapping_by_key_local",
        StoredProcedure::ValidateMappingLocal => "validate_mapping_local",
        StoredProcedure::BulkOperationShardMappingsLocal => "bulk_operation_shard_mappings_local",
        StoredProcedure::KillSessionsForShardMappingLocal => "kill_sessions_for_shard_mapping_local",

        StoredProcedure::UpgradeStoreGlobal => "upgrade_store_global",
        StoredProcedure::UpgradeStoreLocal => "upgrade_store_local",
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn execute_operation(
        &self,
        kind: TransactionKind,
        procedure: StoredProcedure,
        payload: Payload,
    ) -> Result<StoreCallResult, StoreError> {
        if !kind.is_transactional() {
            warn!(?procedure, "executing non-transactional call against a transactional backend");
        }
        self.call_one(procedure, &payload).await
    }

    async fn execute_command_batch(
        &self,
        kind: TransactionKind,
        commands: Vec<(StoredProcedure, Payload)>,
    ) -> Result<Vec<StoreCallResult>, StoreError> {
        let mut out = Vec::with_capacity(commands.len());
        for (procedure, payload) in commands {
            let result = self.execute_operation(kind, procedure, payload).await?;
            let stop = !result.is_success();
            out.push(result);
            if stop {
                break;
            }
        }
        Ok(out)
    }
}
