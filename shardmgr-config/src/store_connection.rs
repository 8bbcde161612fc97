//! Parses a GSM/LSM store connection string: a `postgres://` URL naming
//! the server that hosts the `__ShardManagement` schema.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Where to reach one store (GSM or one shard's LSM).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StoreConnectionString {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
}

impl StoreConnectionString {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let url = Url::parse(raw).map_err(|_| Error::InvalidConnectionString(raw.to_string()))?;

        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidConnectionString(raw.to_string()))?
            .to_string();
        let port = url.port().unwrap_or(5432);
        let database = url.path().trim_start_matches('/').to_string();
        let user = url.username().to_string();

        if database.is_empty() {
            return Err(Error::MissingField("database"));
        }
        if user.is_empty() {
            return Err(Error::MissingField("user"));
        }

        Ok(Self {
            host,
            port,
            database,
            user,
        })
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5432,
            database: "shardmapmanager".into(),
            user: "shardmgr".into(),
        }
    }
}

impl std::fmt::Display for StoreConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        let conn =
            StoreConnectionString::parse("postgres://shardmgr@db.internal:6543/gsm").unwrap();
        assert_eq!(conn.host, "db.internal");
        assert_eq!(conn.port, 6543);
        assert_eq!(conn.database, "gsm");
        assert_eq!(conn.user, "shardmgr");
    }

    #[test]
    fn test_default_port() {
        let conn = StoreConnectionString::parse("postgres://shardmgr@db.internal/gsm").unwrap();
        assert_eq!(conn.port, 5432);
    }

    #[test]
    fn test_missing_database() {
        let err = StoreConnectionString::parse("postgres://shardmgr@db.internal/").unwrap_err();
        assert!(matches!(err, Error::MissingField("database")));
    }

    #[test]
    fn test_missing_user() {
        let err = StoreConnectionString::parse("postgres://db.internal/gsm").unwrap_err();
        assert!(matches!(err, Error::MissingField("user")));
    }
}
