pub mod memory;
pub mod models;
pub mod mysql;

use async_trait::async_trait;

use crate::error::AppResult;

pub use memory::MemoryCredentialStore;
pub use models::{UserId, UserNodeConfig};
pub use mysql::SqlCredentialStore;

/// Durable per-user node configuration
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> AppResult<Option<UserNodeConfig>>;

    /// Insert or overwrite the user's record; never creates a second one
    async fn put(&self, user_id: UserId, username: Option<&str>, config: &UserNodeConfig) -> AppResult<()>;
}
