use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::models::{UserId, UserNodeConfig};
use super::CredentialStore;
use crate::error::AppResult;

/// Process-local store. Credentials are held in plaintext and lost on exit.
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<UserId, (Option<String>, UserNodeConfig)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_id: UserId) -> AppResult<Option<UserNodeConfig>> {
        Ok(self
            .records
            .read()
            .await
            .get(&user_id)
            .map(|(_, config)| config.clone()))
    }

    async fn put(&self, user_id: UserId, username: Option<&str>, config: &UserNodeConfig) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert(user_id, (username.map(str::to_string), config.clone()));
        Ok(())
    }
}
