use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;

use super::models::{NodeUserRow, UserId, UserNodeConfig};
use super::CredentialStore;
use crate::config::DatabaseConfig;
use crate::crypto::CredentialCipher;
use crate::error::{AppError, AppResult};

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<MySqlPool> {
    let url = config.url();
    tracing::info!("Connecting to database at {}:{}/{}", config.host, config.port, config.name);

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&url)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {}", e)))?;

    tracing::info!("Database connection pool created (max: {})", config.max_connections);
    Ok(pool)
}

pub async fn run_migrations(pool: &MySqlPool) -> AppResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node_users (
            user_id BIGINT PRIMARY KEY,
            username VARCHAR(64) NULL,
            node_host VARCHAR(255) NOT NULL,
            node_port SMALLINT UNSIGNED NOT NULL DEFAULT 8232,
            rpc_user VARCHAR(255) NOT NULL DEFAULT '',
            rpc_password_enc TEXT NOT NULL,
            notifications_enabled BOOLEAN NOT NULL DEFAULT TRUE,
            last_block_count BIGINT UNSIGNED NOT NULL DEFAULT 0,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// MySQL-backed store; RPC passwords are sealed before they are written
pub struct SqlCredentialStore {
    pool: MySqlPool,
    cipher: CredentialCipher,
}

impl SqlCredentialStore {
    pub fn new(pool: MySqlPool, cipher: CredentialCipher) -> Self {
        Self { pool, cipher }
    }

    fn row_to_config(&self, row: NodeUserRow) -> AppResult<UserNodeConfig> {
        let rpc_password = if row.rpc_password_enc.is_empty() {
            String::new()
        } else {
            self.cipher.open(&row.rpc_password_enc)?
        };

        tracing::debug!(
            "Loaded node config for user {} ({})",
            row.user_id,
            row.username.as_deref().unwrap_or("unknown")
        );

        Ok(UserNodeConfig {
            host: row.node_host,
            port: row.node_port,
            rpc_user: row.rpc_user,
            rpc_password,
            notifications_enabled: row.notifications_enabled,
            last_block_count: row.last_block_count,
        })
    }
}

#[async_trait]
impl CredentialStore for SqlCredentialStore {
    async fn get(&self, user_id: UserId) -> AppResult<Option<UserNodeConfig>> {
        let row = sqlx::query_as::<_, NodeUserRow>(
            r#"
            SELECT user_id, username, node_host, node_port, rpc_user, rpc_password_enc,
                   notifications_enabled, last_block_count
            FROM node_users WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.row_to_config(r)).transpose()
    }

    async fn put(&self, user_id: UserId, username: Option<&str>, config: &UserNodeConfig) -> AppResult<()> {
        let sealed = if config.rpc_password.is_empty() {
            String::new()
        } else {
            self.cipher.seal(&config.rpc_password)?
        };

        sqlx::query(
            r#"
            INSERT INTO node_users
                (user_id, username, node_host, node_port, rpc_user, rpc_password_enc,
                 notifications_enabled, last_block_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                username = VALUES(username),
                node_host = VALUES(node_host),
                node_port = VALUES(node_port),
                rpc_user = VALUES(rpc_user),
                rpc_password_enc = VALUES(rpc_password_enc),
                notifications_enabled = VALUES(notifications_enabled),
                last_block_count = VALUES(last_block_count)
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(&config.host)
        .bind(config.port)
        .bind(&config.rpc_user)
        .bind(sealed)
        .bind(config.notifications_enabled)
        .bind(config.last_block_count)
        .execute(&self.pool)
        .await?;

        tracing::info!("Stored node config for user {} ({}:{})", user_id, config.host, config.port);
        Ok(())
    }
}
