use crate::error::Error;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Session token seam shared by the socket client (auth frame on connect)
/// and the HTTP backend (bearer header, cleared on 401).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn token(&self) -> Option<String>;
    async fn store(&self, token: &str) -> Result<(), Error>;
    async fn clear(&self) -> Result<(), Error>;
}

/// In-memory store for tests and short-lived sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    async fn store(&self, token: &str) -> Result<(), Error> {
        *self.token.write() = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.token.write() = None;
        Ok(())
    }
}
