//! Builds a DDR (data-dependent-routing) connection string for a
//! resolved shard (spec.md §4.K). Distinct from [`crate::mapper`]'s
//! [`crate::mapper::LsmConnector`], which dials the GSM/LSM protocol for
//! management operations — this builder is what an application uses to
//! open its own data connection once the mapper has told it which shard
//! owns a key.

mod error;

pub use error::ConnectionBuilderError;

use shardmgr_config::{Credential, CredentialProvider};
use uuid::Uuid;

use crate::entities::{Shard, ShardLocation};

/// Caller-supplied request for a DDR connection. Any field here that
/// collides with what the resolved shard dictates is rejected rather
/// than silently overridden (spec.md §4.K) — a caller-supplied
/// `DataSource`/`InitialCatalog` would let an application route around
/// the mapping the mapper just resolved, and `connect_retry_count > 1`
/// would let libpq silently reconnect to a server holding a stale
/// mapping.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRequest {
    pub data_source: Option<String>,
    pub initial_catalog: Option<String>,
    pub connect_retry_count: Option<u32>,
    pub application_name: Option<String>,
}

/// Prepares libpq keyword/value connection strings for shards resolved
/// by a [`crate::mapper::Mapper`]. One builder is constructed per
/// `ShardMapManager` and reused across lookups; it holds no per-request
/// state.
pub struct ConnectionBuilder {
    library_version: shardmgr_config::StoreVersion,
}

impl ConnectionBuilder {
    pub fn new(library_version: shardmgr_config::StoreVersion) -> Self {
        Self { library_version }
    }

    /// Builds the connection string for `shard`, scoped to `shard_map_id`
    /// so the `ESC_v<major><minor>_<shardMapId>` application-name suffix
    /// lets an operator's kill-sessions query target exactly the
    /// sessions this library opened for that shard map (spec.md §4.K).
    pub async fn build(
        &self,
        request: &ConnectionRequest,
        shard: &Shard,
        shard_map_id: Uuid,
        credentials: &dyn CredentialProvider,
    ) -> Result<String, ConnectionBuilderError> {
        if request.data_source.is_some() {
            return Err(ConnectionBuilderError::DisallowedField("DataSource"));
        }
        if request.initial_catalog.is_some() {
            return Err(ConnectionBuilderError::DisallowedField("InitialCatalog"));
        }
        if request.connect_retry_count.is_some_and(|n| n > 1) {
            return Err(ConnectionBuilderError::ClientSideReconnect);
        }

        let credential = credentials
            .resolve()
            .await
            .map_err(ConnectionBuilderError::Credential)?;

        let application_name = format!(
            "{}_ESC_v{}{}_{}",
            request.application_name.as_deref().unwrap_or("shardmgr"),
            self.library_version.major,
            self.library_version.minor,
            shard_map_id,
        );

        Ok(render(&shard.location, &credential, &application_name))
    }
}

fn render(location: &ShardLocation, credential: &Credential, application_name: &str) -> String {
    let mut parts = vec![
        format!("host={}", location.server),
        format!("port={}", location.port),
        format!("dbname={}", location.database),
        format!("application_name={application_name}"),
    ];
    match credential {
        Credential::Password { user, password } => {
            parts.push(format!("user={user}"));
            parts.push(format!("password={password}"));
        }
        Credential::Integrated => {
            parts.push("sspi=true".to_string());
        }
        Credential::Token(token) => {
            parts.push("user=aad_token".to_string());
            parts.push(format!("password={token}"));
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ShardLocation, ShardProtocol};
    use shardmgr_config::StaticCredential;

    fn shard() -> Shard {
        Shard::new(
            Uuid::new_v4(),
            ShardLocation {
                protocol: ShardProtocol::Tcp,
                server: "srv-a".into(),
                port: 5432,
                database: "db0".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_builds_connection_string_with_suffix() {
        let builder = ConnectionBuilder::new(shardmgr_config::StoreVersion::new(1, 3));
        let shard = shard();
        let shard_map_id = Uuid::new_v4();
        let creds = StaticCredential::new("app", "secret");

        let conn = builder
            .build(&ConnectionRequest::default(), &shard, shard_map_id, &creds)
            .await
            .unwrap();

        assert!(conn.contains("host=srv-a"));
        assert!(conn.contains("dbname=db0"));
        assert!(conn.contains(&format!("ESC_v13_{shard_map_id}")));
        assert!(conn.contains("user=app"));
        assert!(conn.contains("password=secret"));
    }

    #[tokio::test]
    async fn test_rejects_caller_supplied_data_source() {
        let builder = ConnectionBuilder::new(shardmgr_config::StoreVersion::ZERO);
        let shard = shard();
        let creds = StaticCredential::new("app", "secret");
        let request = ConnectionRequest {
            data_source: Some("evil-host".into()),
            ..Default::default()
        };

        let err = builder
            .build(&request, &shard, Uuid::new_v4(), &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionBuilderError::DisallowedField("DataSource")));
    }

    #[tokio::test]
    async fn test_rejects_client_side_reconnect() {
        let builder = ConnectionBuilder::new(shardmgr_config::StoreVersion::ZERO);
        let shard = shard();
        let creds = StaticCredential::new("app", "secret");
        let request = ConnectionRequest {
            connect_retry_count: Some(3),
            ..Default::default()
        };

        let err = builder
            .build(&request, &shard, Uuid::new_v4(), &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionBuilderError::ClientSideReconnect));
    }

    #[tokio::test]
    async fn test_allows_retry_count_of_one() {
        let builder = ConnectionBuilder::new(shardmgr_config::StoreVersion::ZERO);
        let shard = shard();
        let creds = StaticCredential::new("app", "secret");
        let request = ConnectionRequest {
            connect_retry_count: Some(1),
            ..Default::default()
        };

        assert!(builder
            .build(&request, &shard, Uuid::new_v4(), &creds)
            .await
            .is_ok());
    }
}
