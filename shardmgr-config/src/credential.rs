use async_trait::async_trait;
use thiserror::Error;

/// A resolved credential for a store connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Username/password pair.
    Password { user: String, password: String },
    /// Integrated (OS-level) authentication; no secret travels with the
    /// connection string.
    Integrated,
    /// A bearer token, e.g. from a managed-identity provider.
    Token(String),
}

#[derive(Debug, Error)]
#[error("failed to resolve credential: {0}")]
pub struct CredentialError(pub String);

/// Acquisition of the actual secret (integrated / password / managed
/// identity) is explicitly out of scope (spec.md §1); this trait is the
/// seam the connection builder (Component K) consumes. Implement it in a
/// downstream crate to plug in a real credential source.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self) -> Result<Credential, CredentialError>;
}

/// A fixed username/password, useful for tests and callers that manage
/// their own secrets outside of this library.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    user: String,
    password: String,
}

impl StaticCredential {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn resolve(&self) -> Result<Credential, CredentialError> {
        Ok(Credential::Password {
            user: self.user.clone(),
            password: self.password.clone(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_static_credential() {
        let cred = StaticCredential::new("alice", "hunter2");
        let resolved = cred.resolve().await.unwrap();
        assert_eq!(
            resolved,
            Credential::Password {
                user: "alice".into(),
                password: "hunter2".into(),
            }
        );
    }
}
