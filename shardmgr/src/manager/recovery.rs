//! The recovery manager (spec.md §4.I): attach/detach a shard's row in
//! the GSM without touching the shard's own data, replace a shard's
//! mapping set wholesale, and diagnose drift between what the GSM and
//! a shard's LSM each believe about that shard's mappings.

use std::sync::Arc;

use uuid::Uuid;

use crate::entities::{Mapping, MappingStatus, Shard, ShardLocation};
use crate::mapper::{mapping_entity, shard_entity, shard_map_filter, LsmConnector};
use crate::store::{Payload, StoreConnection, StoreError, StoredProcedure, TransactionKind};

use super::error::ManagerError;

/// One discrepancy between the GSM's and a shard's LSM's view of that
/// shard's mappings. Diagnostic only — `detect_mismatch` never mutates
/// either side; an operator reads this and decides whether to call
/// [`RecoveryManager::replace_mappings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingDifference {
    /// The GSM has this mapping but the shard's LSM does not.
    OnlyInGsm(Mapping),
    /// The shard's LSM has this mapping but the GSM does not.
    OnlyInLsm(Mapping),
    /// Both sides have the mapping but disagree on its status.
    StatusMismatch {
        mapping_id: Uuid,
        gsm_status: MappingStatus,
        lsm_status: MappingStatus,
    },
}

pub struct RecoveryManager {
    gsm: StoreConnection,
    connector: Arc<dyn LsmConnector>,
}

impl RecoveryManager {
    pub fn new(gsm: StoreConnection, connector: Arc<dyn LsmConnector>) -> Self {
        Self { gsm, connector }
    }

    /// Registers `shard` and its known mapping set directly in the GSM,
    /// for a shard that already exists physically but was never attached
    /// (e.g. restored from a backup).
    pub async fn attach_shard(&self, shard: &Shard, mappings: &[Mapping]) -> Result<(), ManagerError> {
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::AttachShardGlobal,
                Payload {
                    shard: Some(shard_entity(shard)),
                    mappings: mappings.iter().map(mapping_entity).collect(),
                    ..Payload::empty()
                },
            )
            .await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(ManagerError::Store(StoreError::semantic(result.code)))
        }
    }

    /// Removes a shard and all of its mappings from the GSM without
    /// touching the shard's own data.
    pub async fn detach_shard(&self, location: ShardLocation) -> Result<(), ManagerError> {
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::DetachShardGlobal,
                Payload {
                    location: Some(location),
                    ..Payload::empty()
                },
            )
            .await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(ManagerError::Store(StoreError::semantic(result.code)))
        }
    }

    /// Overwrites every mapping the GSM has for `shard` with `mappings`,
    /// bypassing the two-phase operation engine — used once an operator
    /// has reconciled a `detect_mismatch` report and wants the GSM to
    /// simply match what the shard actually holds.
    pub async fn replace_mappings(&self, shard: &Shard, mappings: &[Mapping]) -> Result<(), ManagerError> {
        let result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::ReplaceShardMappingsGlobal,
                Payload {
                    shard: Some(shard_entity(shard)),
                    mappings: mappings.iter().map(mapping_entity).collect(),
                    ..Payload::empty()
                },
            )
            .await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(ManagerError::Store(StoreError::semantic(result.code)))
        }
    }

    pub async fn detect_mismatch(&self, shard: &Shard) -> Result<Vec<MappingDifference>, ManagerError> {
        let gsm_result = self
            .gsm
            .execute(
                TransactionKind::Global,
                StoredProcedure::GetAllMappingsGlobal,
                Payload {
                    shard: Some(shard_map_filter(shard.shard_map_id)),
                    ..Payload::empty()
                },
            )
            .await?;
        let gsm_mappings: Vec<Mapping> = gsm_result
            .results
            .mappings
            .into_iter()
            .filter(|m| m.shard_id == shard.id)
            .collect();

        let lsm = self.connector.connect(&shard.location).await?;
        let lsm_result = lsm
            .execute(TransactionKind::LocalSource, StoredProcedure::GetAllShardMappingsLocal, Payload::empty())
            .await?;

        Ok(diff(&gsm_mappings, &lsm_result.results.mappings))
    }
}

fn diff(gsm: &[Mapping], lsm: &[Mapping]) -> Vec<MappingDifference> {
    let mut differences = Vec::new();
    for g in gsm {
        match lsm.iter().find(|l| l.id == g.id) {
            None => differences.push(MappingDifference::OnlyInGsm(g.clone())),
            Some(l) if l.status != g.status => differences.push(MappingDifference::StatusMismatch {
                mapping_id: g.id,
                gsm_status: g.status,
                lsm_status: l.status,
            }),
            Some(_) => {}
        }
    }
    for l in lsm {
        if gsm.iter().all(|g| g.id != l.id) {
            differences.push(MappingDifference::OnlyInLsm(l.clone()));
        }
    }
    differences
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ShardLocation, ShardProtocol};
    use crate::key::{ShardKey, ShardKeyType, ShardRange};
    use crate::mapper::FakeLsmConnector;
    use crate::store::{FakeStore, Store as _};
    use shardmgr_config::StoreVersion;

    fn location() -> ShardLocation {
        ShardLocation {
            protocol: ShardProtocol::Tcp,
            server: "srv-a".into(),
            port: 5432,
            database: "db0".into(),
        }
    }

    #[tokio::test]
    async fn test_detect_mismatch_reports_status_drift() {
        let gsm_store = Arc::new(FakeStore::new(StoreVersion::ZERO));
        let gsm = StoreConnection::new(gsm_store.clone());
        let lsm_store = Arc::new(FakeStore::new(StoreVersion::ZERO));
        let connector = Arc::new(FakeLsmConnector::new());
        connector.register(location(), lsm_store.clone() as Arc<dyn crate::store::Store>);

        let shard_map_id = Uuid::new_v4();
        let shard = Shard::new(shard_map_id, location());

        let range = ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(10)).unwrap();
        let mapping = Mapping::new_range(shard_map_id, shard.id, range);

        gsm.execute(
            TransactionKind::Global,
            StoredProcedure::AttachShardGlobal,
            Payload {
                shard: Some(shard_entity(&shard)),
                mappings: vec![mapping_entity(&mapping)],
                ..Payload::empty()
            },
        )
        .await
        .unwrap();

        let mut offline = mapping.clone();
        offline.status = MappingStatus::Offline;
        lsm_store
            .execute_operation(
                TransactionKind::LocalSource,
                StoredProcedure::AddShardLocal,
                Payload {
                    shard: Some(shard_entity(&shard)),
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();
        lsm_store
            .execute_operation(
                TransactionKind::LocalSource,
                StoredProcedure::BulkOperationShardMappingsLocal,
                Payload {
                    bulk_steps: vec![crate::store::BulkStep {
                        id: 0,
                        kind: crate::store::BulkStepKind::Add,
                        mapping: mapping_entity(&offline),
                    }],
                    ..Payload::empty()
                },
            )
            .await
            .unwrap();

        let recovery = RecoveryManager::new(gsm, connector);
        let differences = recovery.detect_mismatch(&shard).await.unwrap();

        assert_eq!(
            differences,
            vec![MappingDifference::StatusMismatch {
                mapping_id: mapping.id,
                gsm_status: MappingStatus::Online,
                lsm_status: MappingStatus::Offline,
            }]
        );
    }
}
