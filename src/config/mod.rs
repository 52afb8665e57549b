use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

/// Where per-user node credentials are kept
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mysql,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// AES-256 key for RPC passwords at rest (exactly 32 bytes)
    pub encryption_key: String,
    /// Bearer token the chat front end presents on every command
    pub api_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub default_port: u16,
    pub rpc_timeout_secs: u64,
    /// HTTP/HTTPS/SOCKS5 proxy for node RPC requests
    pub rpc_proxy: Option<String>,
    /// Cookie file used by `setup localhost` when no credentials are given
    pub cookie_path: Option<String>,
}

impl NodeConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn cookie_file(&self) -> PathBuf {
        match &self.cookie_path {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
                PathBuf::from(home).join(".junocash").join(".cookie")
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Kept back from the transparent balance when shielding everything
    pub fee_reserve: Decimal,
    /// Fee passed to z_sendmany
    pub declared_fee: Decimal,
    pub min_confirmations: u32,
    pub poll_initial_delay_ms: u64,
    pub poll_max_attempts: u32,
    pub poll_backoff_ms: u64,
    pub poll_max_backoff_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            fee_reserve: Decimal::from_str("0.002").unwrap_or_default(),
            declared_fee: Decimal::from_str("0.00015").unwrap_or_default(),
            min_confirmations: 1,
            poll_initial_delay_ms: 3000,
            poll_max_attempts: 3,
            poll_backoff_ms: 2000,
            poll_max_backoff_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub node: NodeConfig,
    pub transfer: TransferConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Server defaults
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            // Database defaults
            .set_default("database.host", "localhost")?
            .set_default("database.port", 3306)?
            .set_default("database.user", "root")?
            .set_default("database.password", "")?
            .set_default("database.name", "juno_bot")?
            .set_default("database.max_connections", 10)?
            .set_default("storage.backend", "mysql")?
            // Secrets have no usable default; they must be supplied at runtime
            .set_default("security.encryption_key", "")?
            .set_default("security.api_token", "")?
            // Node defaults
            .set_default("node.default_port", 8232)?
            .set_default("node.rpc_timeout_secs", 10)?
            .set_default("node.rpc_proxy", Option::<String>::None)?
            .set_default("node.cookie_path", Option::<String>::None)?
            // Transfer defaults
            .set_default("transfer.fee_reserve", "0.002")?
            .set_default("transfer.declared_fee", "0.00015")?
            .set_default("transfer.min_confirmations", 1)?
            .set_default("transfer.poll_initial_delay_ms", 3000)?
            .set_default("transfer.poll_max_attempts", 3)?
            .set_default("transfer.poll_backoff_ms", 2000)?
            .set_default("transfer.poll_max_backoff_ms", 10_000)?
            // Load from config.toml if exists
            .add_source(File::with_name("config").required(false))
            // Override with environment variables (prefix: JUNOBOT_)
            // Use __ as separator so JUNOBOT_SECURITY__API_TOKEN -> security.api_token
            .add_source(
                Environment::with_prefix("JUNOBOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.encryption_key.len() != 32 {
            return Err(ConfigError::Message(
                "Encryption key must be exactly 32 bytes (set JUNOBOT_SECURITY__ENCRYPTION_KEY)"
                    .to_string(),
            ));
        }

        if self.security.api_token.is_empty() {
            return Err(ConfigError::Message(
                "API token cannot be empty (set JUNOBOT_SECURITY__API_TOKEN)".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Mysql {
            if self.database.host.is_empty() {
                return Err(ConfigError::Message(
                    "Database host cannot be empty".to_string(),
                ));
            }
            if self.database.name.is_empty() {
                return Err(ConfigError::Message(
                    "Database name cannot be empty".to_string(),
                ));
            }
        }

        if self.node.rpc_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Node RPC timeout must be at least one second".to_string(),
            ));
        }

        if self.transfer.fee_reserve < Decimal::ZERO || self.transfer.declared_fee < Decimal::ZERO {
            return Err(ConfigError::Message(
                "Transfer fees cannot be negative".to_string(),
            ));
        }

        if self.transfer.poll_max_attempts == 0 {
            return Err(ConfigError::Message(
                "At least one operation status poll is required".to_string(),
            ));
        }

        Ok(())
    }
}
