use sqlx::FromRow;

use crate::node::NodeEndpoint;

/// Chat-platform identity of a user
pub type UserId = i64;

/// Connection details for one user's node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNodeConfig {
    pub host: String,
    pub port: u16,
    pub rpc_user: String,
    pub rpc_password: String,
    pub notifications_enabled: bool,
    pub last_block_count: u64,
}

impl UserNodeConfig {
    pub fn new(host: &str, port: u16, rpc_user: &str, rpc_password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            rpc_user: rpc_user.to_string(),
            rpc_password: rpc_password.to_string(),
            notifications_enabled: true,
            last_block_count: 0,
        }
    }

    pub fn endpoint(&self) -> NodeEndpoint {
        NodeEndpoint {
            host: self.host.clone(),
            port: self.port,
            rpc_user: self.rpc_user.clone(),
            rpc_password: self.rpc_password.clone(),
        }
    }
}

/// Row of the node_users table; the password column holds ciphertext
#[derive(Debug, Clone, FromRow)]
pub struct NodeUserRow {
    pub user_id: i64,
    pub username: Option<String>,
    pub node_host: String,
    pub node_port: u16,
    pub rpc_user: String,
    pub rpc_password_enc: String,
    pub notifications_enabled: bool,
    pub last_block_count: u64,
}
