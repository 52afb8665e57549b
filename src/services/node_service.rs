use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::error::{AppError, AppResult};
use crate::node::accounts::AccountAddressEntry;
use crate::node::cookie::{is_local_host, read_cookie};
use crate::node::types::{parse_result, BlockchainInfo, MiningInfo};
use crate::node::{AccountResolver, BalanceOracle, BalanceSnapshot, NodeEndpoint, NodeRpc};
use crate::store::{CredentialStore, UserId, UserNodeConfig};

/// Arguments of `setup`, as typed
#[derive(Debug, Clone, Default)]
pub struct SetupRequest {
    pub host: String,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
    pub port: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SetupOutcome {
    pub config: UserNodeConfig,
    pub chain: BlockchainInfo,
    /// Cookie user when credentials were read from the local cookie file
    pub cookie_user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkStatus {
    pub chain: BlockchainInfo,
    pub peers: usize,
}

/// One-shot monitoring commands plus node registration
pub struct NodeService {
    rpc: Arc<dyn NodeRpc>,
    store: Arc<dyn CredentialStore>,
    balances: BalanceOracle,
    accounts: AccountResolver,
    default_port: u16,
    cookie_file: PathBuf,
}

impl NodeService {
    pub fn new(rpc: Arc<dyn NodeRpc>, store: Arc<dyn CredentialStore>, config: &NodeConfig) -> Self {
        Self {
            balances: BalanceOracle::new(rpc.clone()),
            accounts: AccountResolver::new(rpc.clone()),
            rpc,
            store,
            default_port: config.default_port,
            cookie_file: config.cookie_file(),
        }
    }

    /// Loads the user's node config; every node-facing command starts here
    pub async fn require_config(&self, user_id: UserId) -> AppResult<UserNodeConfig> {
        self.store.get(user_id).await?.ok_or(AppError::ConfigMissing)
    }

    /// Tests the connection and, if it works, stores (or overwrites) the user's node
    pub async fn setup(
        &self,
        user_id: UserId,
        username: Option<&str>,
        request: SetupRequest,
    ) -> AppResult<SetupOutcome> {
        let host = request.host.trim().to_string();
        if host.is_empty() {
            return Err(AppError::ValidationError("Host is required".to_string()));
        }

        let port = match request.port.as_deref() {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| AppError::ValidationError(format!("Invalid port: {}", raw)))?,
            None => self.default_port,
        };

        let (rpc_user, rpc_password, cookie_user) = match (request.rpc_user, request.rpc_password) {
            (Some(user), Some(password)) => (user, password, None),
            _ if is_local_host(&host) => {
                let (user, password) = read_cookie(&self.cookie_file)?;
                tracing::info!("Using cookie credentials from {}", self.cookie_file.display());
                (user.clone(), password, Some(user))
            }
            _ => {
                return Err(AppError::ValidationError(
                    "For remote nodes, provide: setup <host> <user> <password> [port]".to_string(),
                ))
            }
        };

        let mut config = UserNodeConfig::new(&host, port, &rpc_user, &rpc_password);
        let chain = self
            .blockchain_info(&config.endpoint())
            .await
            .map_err(|e| match e {
                AppError::Rpc(source) => AppError::ConnectionFailed {
                    host: host.clone(),
                    port,
                    source,
                },
                other => other,
            })?;

        config.last_block_count = chain.blocks;
        self.store.put(user_id, username, &config).await?;

        tracing::info!("User {} connected node {}:{} at height {}", user_id, host, port, chain.blocks);

        Ok(SetupOutcome {
            config,
            chain,
            cookie_user,
        })
    }

    pub async fn balance(&self, config: &UserNodeConfig) -> AppResult<BalanceSnapshot> {
        self.balances.total_balance(&config.endpoint()).await
    }

    pub async fn mining(&self, config: &UserNodeConfig) -> AppResult<MiningInfo> {
        let value = self
            .rpc
            .call(&config.endpoint(), "getmininginfo", json!([]))
            .await?;
        Ok(parse_result("getmininginfo", value)?)
    }

    pub async fn network(&self, config: &UserNodeConfig) -> AppResult<NetworkStatus> {
        let endpoint = config.endpoint();
        let chain = self.blockchain_info(&endpoint).await?;

        // Peer count is best effort
        let peers = match self.rpc.call(&endpoint, "getpeerinfo", json!([])).await {
            Ok(value) => value.as_array().map(Vec::len).unwrap_or(0),
            Err(e) => {
                tracing::warn!("getpeerinfo failed on {}: {}", endpoint.host, e);
                0
            }
        };

        Ok(NetworkStatus { chain, peers })
    }

    pub async fn addresses(&self, config: &UserNodeConfig) -> AppResult<Vec<AccountAddressEntry>> {
        self.accounts.unified_addresses(&config.endpoint()).await
    }

    async fn blockchain_info(&self, endpoint: &NodeEndpoint) -> AppResult<BlockchainInfo> {
        let value = self.rpc.call(endpoint, "getblockchaininfo", json!([])).await?;
        Ok(parse_result("getblockchaininfo", value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::testing::ScriptedNode;
    use crate::node::RpcError;
    use crate::store::MemoryCredentialStore;

    fn node_config(cookie_path: Option<String>) -> NodeConfig {
        NodeConfig {
            default_port: 8232,
            rpc_timeout_secs: 10,
            rpc_proxy: None,
            cookie_path,
        }
    }

    fn service(node: Arc<ScriptedNode>, store: Arc<MemoryCredentialStore>) -> NodeService {
        NodeService::new(node, store, &node_config(None))
    }

    fn request(host: &str, user: &str, pass: &str, port: Option<&str>) -> SetupRequest {
        SetupRequest {
            host: host.to_string(),
            rpc_user: Some(user.to_string()),
            rpc_password: Some(pass.to_string()),
            port: port.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_setup_stores_exact_credentials() {
        let node = Arc::new(ScriptedNode::new());
        node.respond("getblockchaininfo", Ok(json!({"blocks": 100, "chain": "main"})));
        let store = Arc::new(MemoryCredentialStore::new());
        let service = service(node.clone(), store.clone());

        let outcome = service
            .setup(1, Some("alice"), request("host", "user", "pass", Some("8232")))
            .await
            .unwrap();
        assert_eq!(outcome.chain.blocks, 100);

        let stored = store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.host, "host");
        assert_eq!(stored.port, 8232);
        assert_eq!(stored.rpc_user, "user");
        assert_eq!(stored.rpc_password, "pass");
        assert_eq!(stored.last_block_count, 100);
        assert_eq!(node.endpoints()[0], stored.endpoint());
    }

    #[tokio::test]
    async fn test_second_setup_overwrites() {
        let node = Arc::new(ScriptedNode::new());
        node.respond("getblockchaininfo", Ok(json!({"blocks": 100, "chain": "main"})));
        let store = Arc::new(MemoryCredentialStore::new());
        let service = service(node, store.clone());

        service.setup(1, None, request("host", "user", "pass", None)).await.unwrap();
        service.setup(1, None, request("vps", "u2", "p2", Some("18232"))).await.unwrap();

        assert_eq!(store.len().await, 1);
        let stored = store.get(1).await.unwrap().unwrap();
        assert_eq!((stored.host.as_str(), stored.port), ("vps", 18232));
    }

    #[tokio::test]
    async fn test_failed_connection_saves_nothing() {
        let node = Arc::new(ScriptedNode::new());
        node.respond("getblockchaininfo", Err(RpcError::AuthFailure));
        let store = Arc::new(MemoryCredentialStore::new());
        let service = service(node, store.clone());

        let err = service.setup(1, None, request("host", "user", "bad", None)).await.unwrap_err();
        assert!(matches!(err, AppError::ConnectionFailed { source: RpcError::AuthFailure, .. }));
        assert!(store.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remote_setup_needs_credentials() {
        let node = Arc::new(ScriptedNode::new());
        let service = service(node.clone(), Arc::new(MemoryCredentialStore::new()));

        let bare = SetupRequest {
            host: "203.0.113.5".to_string(),
            ..SetupRequest::default()
        };
        assert!(matches!(service.setup(1, None, bare).await, Err(AppError::ValidationError(_))));
        assert!(node.methods().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_port_is_rejected() {
        let node = Arc::new(ScriptedNode::new());
        let service = service(node.clone(), Arc::new(MemoryCredentialStore::new()));

        let err = service
            .setup(1, None, request("host", "user", "pass", Some("eighty")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(node.methods().is_empty());
    }

    #[tokio::test]
    async fn test_localhost_setup_reads_cookie() {
        let path = std::env::temp_dir().join(format!("junobot-setup-cookie-{}", std::process::id()));
        std::fs::write(&path, "__cookie__:from-file").unwrap();

        let node = Arc::new(ScriptedNode::new());
        node.respond("getblockchaininfo", Ok(json!({"blocks": 5, "chain": "test"})));
        let store = Arc::new(MemoryCredentialStore::new());
        let service = NodeService::new(
            node,
            store.clone(),
            &node_config(Some(path.display().to_string())),
        );

        let local = SetupRequest {
            host: "localhost".to_string(),
            ..SetupRequest::default()
        };
        let outcome = service.setup(3, None, local).await.unwrap();
        assert_eq!(outcome.cookie_user.as_deref(), Some("__cookie__"));
        assert_eq!(store.get(3).await.unwrap().unwrap().rpc_password, "from-file");

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_network_tolerates_peer_failure() {
        let node = Arc::new(ScriptedNode::new());
        node.respond(
            "getblockchaininfo",
            Ok(json!({"chain": "main", "blocks": 1234, "initialblockdownload": false})),
        );
        node.respond("getpeerinfo", Err(RpcError::NetworkError("reset".into())));
        let service = service(node, Arc::new(MemoryCredentialStore::new()));

        let status = service
            .network(&UserNodeConfig::new("host", 8232, "u", "p"))
            .await
            .unwrap();
        assert_eq!(status.peers, 0);
        assert!(status.chain.is_synced());
    }

    #[tokio::test]
    async fn test_require_config() {
        let service = service(Arc::new(ScriptedNode::new()), Arc::new(MemoryCredentialStore::new()));
        assert!(matches!(service.require_config(9).await, Err(AppError::ConfigMissing)));
    }
}
