//! Store-versioned schema and forward-only upgrade pipeline (spec.md
//! §4.C). Global and local stores version independently; both run
//! through the same [`Pipeline`], parameterized by which ordered list
//! of [`UpgradeStep`]s and which pair of `GetStoreVersion*`/
//! `UpgradeStore*` procedures apply.

mod error;
mod upgrade;

pub use error::SchemaError;
pub use upgrade::{UpgradeStep, GLOBAL_UPGRADE_STEPS, LOCAL_UPGRADE_STEPS};

use tracing::{info, instrument};

use shardmgr_config::StoreVersion;

use crate::store::{Payload, StoreConnection, StoredProcedure, TransactionKind};

/// Brings one store up to `client_version` by applying every upgrade
/// step whose `from` is at or above the store's current version and
/// whose `to` is at or below the client's (spec.md §4.C). Idempotent:
/// re-running from the same `from` is a no-op on a `FakeStore`/`PgStore`
/// that already applied it, because each step just (re-)stamps the
/// version row to `to` rather than accumulating state.
pub struct Pipeline {
    pub steps: &'static [UpgradeStep],
    pub get_version: StoredProcedure,
    pub upgrade: StoredProcedure,
    pub kind: TransactionKind,
}

impl Pipeline {
    pub fn global() -> Self {
        Self {
            steps: GLOBAL_UPGRADE_STEPS,
            get_version: StoredProcedure::GetStoreVersionGlobal,
            upgrade: StoredProcedure::UpgradeStoreGlobal,
            kind: TransactionKind::Global,
        }
    }

    pub fn local() -> Self {
        Self {
            steps: LOCAL_UPGRADE_STEPS,
            get_version: StoredProcedure::GetStoreVersionLocal,
            upgrade: StoredProcedure::UpgradeStoreLocal,
            kind: TransactionKind::LocalSource,
        }
    }

    #[instrument(skip(self, conn))]
    pub async fn run(&self, conn: &StoreConnection, client_version: StoreVersion) -> Result<StoreVersion, SchemaError> {
        let start = self.current_version(conn).await?;
        let mut current = start;

        let applicable: Vec<UpgradeStep> = self
            .steps
            .iter()
            .copied()
            .filter(|s| s.from >= start && s.to <= client_version)
            .collect();

        for step in applicable {
            info!(from = %step.from, to = %step.to, "applying upgrade step");
            let result = conn
                .execute(
                    self.kind,
                    self.upgrade,
                    Payload {
                        store_version: Some(step.to),
                        ..Payload::empty()
                    },
                )
                .await
                .map_err(SchemaError::Store)?;
            if !result.is_success() {
                return Err(SchemaError::UpgradeRejected {
                    from: step.from,
                    to: step.to,
                    code: result.code,
                });
            }
            current = step.to;
        }

        Ok(current)
    }

    /// Reads the store's current version, tolerating a store that has
    /// never been touched: the version table itself may not exist yet,
    /// which this treats as `StoreVersion::ZERO` rather than a fatal
    /// error (spec.md §4.C "checkIfExists").
    async fn current_version(&self, conn: &StoreConnection) -> Result<StoreVersion, SchemaError> {
        match conn.execute(self.kind, self.get_version, Payload::empty()).await {
            Ok(result) => Ok(result.results.store_version.unwrap_or(StoreVersion::ZERO)),
            Err(err) if err.is_missing_schema() => Ok(StoreVersion::ZERO),
            Err(err) => Err(SchemaError::Store(err)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::FakeStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upgrade_from_zero_applies_all_steps() {
        let store = Arc::new(FakeStore::new(StoreVersion::ZERO));
        let conn = StoreConnection::new(store);

        let version = Pipeline::global()
            .run(&conn, StoreVersion::new(1, 3))
            .await
            .unwrap();
        assert_eq!(version, StoreVersion::new(1, 3));
    }

    #[tokio::test]
    async fn test_upgrade_is_idempotent_when_rerun() {
        let store = Arc::new(FakeStore::new(StoreVersion::ZERO));
        let conn = StoreConnection::new(store);

        Pipeline::global().run(&conn, StoreVersion::new(1, 3)).await.unwrap();
        let version = Pipeline::global()
            .run(&conn, StoreVersion::new(1, 3))
            .await
            .unwrap();
        assert_eq!(version, StoreVersion::new(1, 3));
    }

    #[tokio::test]
    async fn test_partial_client_version_stops_early() {
        let store = Arc::new(FakeStore::new(StoreVersion::ZERO));
        let conn = StoreConnection::new(store);

        let version = Pipeline::global()
            .run(&conn, StoreVersion::new(1, 1))
            .await
            .unwrap();
        assert_eq!(version, StoreVersion::new(1, 1));
    }
}
