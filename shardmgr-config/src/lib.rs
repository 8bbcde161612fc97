//! Configuration shared by the shard map manager: connection strings,
//! store client versions, and retry tunables.

pub mod credential;
pub mod error;
pub mod retry;
pub mod store_connection;
pub mod version;

pub use credential::{Credential, CredentialProvider, StaticCredential};
pub use error::Error;
pub use retry::RetryPolicy;
pub use store_connection::StoreConnectionString;
pub use version::StoreVersion;
