use crate::error::{AppError, AppResult};
use crate::services::node_service::{NodeService, SetupRequest};
use crate::services::pending::UserLocks;
use crate::services::replies;
use crate::services::transfer_service::TransferService;
use crate::store::UserId;

/// A chat command after `/` and `@botname` have been stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Setup(Vec<String>),
    Balance,
    Mining,
    Network,
    Address,
    Shield(Option<String>),
    Send(Vec<String>),
    Confirm,
    Cancel,
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split_whitespace();
        let head = parts.next().unwrap_or("");
        let args: Vec<String> = parts.map(str::to_string).collect();

        let name = head.strip_prefix('/').unwrap_or(head);
        let name = name.split_once('@').map(|(n, _)| n).unwrap_or(name);

        match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "setup" => Command::Setup(args),
            "balance" => Command::Balance,
            "mining" => Command::Mining,
            "network" => Command::Network,
            "address" => Command::Address,
            "shield" => Command::Shield(args.into_iter().next()),
            "send" => Command::Send(args),
            "confirm" => Command::Confirm,
            "cancel" => Command::Cancel,
            other => Command::Unknown(other.to_string()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Setup(_) => "setup",
            Command::Balance => "balance",
            Command::Mining => "mining",
            Command::Network => "network",
            Command::Address => "address",
            Command::Shield(_) => "shield",
            Command::Send(_) => "send",
            Command::Confirm => "confirm",
            Command::Cancel => "cancel",
            Command::Unknown(_) => "unknown",
        }
    }
}

/// Command boundary: runs one command per user at a time and turns every
/// outcome, failures included, into reply text.
pub struct CommandService {
    nodes: NodeService,
    transfers: TransferService,
    locks: UserLocks,
}

impl CommandService {
    pub fn new(nodes: NodeService, transfers: TransferService) -> Self {
        Self {
            nodes,
            transfers,
            locks: UserLocks::new(),
        }
    }

    pub async fn handle(&self, user_id: UserId, username: Option<&str>, text: &str) -> String {
        let command = Command::parse(text);
        let _guard = self.locks.acquire(user_id).await;

        tracing::info!("User {} issued {}", user_id, command.name());

        match self.dispatch(user_id, username, command).await {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    AppError::DatabaseError(_)
                    | AppError::EncryptionError(_)
                    | AppError::ConfigError(_) => {
                        tracing::error!("Command failed for user {}: {}", user_id, e)
                    }
                    _ => tracing::warn!("Command failed for user {}: {}", user_id, e),
                }
                replies::error(&e)
            }
        }
    }

    async fn dispatch(&self, user_id: UserId, username: Option<&str>, command: Command) -> AppResult<String> {
        match command {
            Command::Start => Ok(replies::welcome()),
            Command::Help => Ok(replies::help()),
            Command::Unknown(name) => Ok(replies::unknown_command(&name)),
            Command::Setup(args) => {
                let mut args = args.into_iter();
                let Some(host) = args.next() else {
                    return Ok(replies::setup_usage());
                };
                let request = SetupRequest {
                    host,
                    rpc_user: args.next(),
                    rpc_password: args.next(),
                    port: args.next(),
                };
                let outcome = self.nodes.setup(user_id, username, request).await?;
                Ok(replies::setup_success(&outcome))
            }
            Command::Balance => {
                let config = self.nodes.require_config(user_id).await?;
                Ok(replies::balance(&self.nodes.balance(&config).await?))
            }
            Command::Mining => {
                let config = self.nodes.require_config(user_id).await?;
                Ok(replies::mining(&self.nodes.mining(&config).await?))
            }
            Command::Network => {
                let config = self.nodes.require_config(user_id).await?;
                Ok(replies::network(&self.nodes.network(&config).await?))
            }
            Command::Address => {
                let config = self.nodes.require_config(user_id).await?;
                Ok(replies::addresses(&self.nodes.addresses(&config).await?))
            }
            Command::Shield(argument) => {
                let config = self.nodes.require_config(user_id).await?;
                let outcome = self
                    .transfers
                    .shield(user_id, &config, argument.as_deref())
                    .await?;
                Ok(replies::shield(&outcome))
            }
            Command::Send(args) => {
                let config = self.nodes.require_config(user_id).await?;
                let [destination, amount, ..] = args.as_slice() else {
                    return Ok(replies::send_usage());
                };
                let prompt = self
                    .transfers
                    .send(user_id, &config, destination, amount)
                    .await?;
                Ok(replies::send_prompt(&prompt))
            }
            Command::Confirm => {
                // Taken before anything else so a failed confirm never leaves it behind
                let pending = self.transfers.take_pending(user_id);
                let config = self.nodes.require_config(user_id).await?;
                let pending = pending.ok_or(AppError::NoPendingTransaction)?;
                let outcome = self.transfers.confirm(user_id, pending, &config).await?;
                Ok(replies::send_outcome(&outcome))
            }
            Command::Cancel => {
                let pending = self.transfers.cancel(user_id)?;
                Ok(replies::cancelled(&pending))
            }
        }
    }

    #[cfg(test)]
    pub fn transfers(&self) -> &TransferService {
        &self.transfers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeConfig, TransferConfig};
    use crate::node::testing::ScriptedNode;
    use crate::store::{CredentialStore, MemoryCredentialStore, UserNodeConfig};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    const USER: UserId = 7;

    /// Memory store whose reads fail once `fail_reads` is set
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryCredentialStore,
        fail_reads: AtomicBool,
    }

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn get(&self, user_id: UserId) -> AppResult<Option<UserNodeConfig>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::DatabaseError("connection lost".to_string()));
            }
            self.inner.get(user_id).await
        }

        async fn put(&self, user_id: UserId, username: Option<&str>, config: &UserNodeConfig) -> AppResult<()> {
            self.inner.put(user_id, username, config).await
        }
    }

    fn service(node: Arc<ScriptedNode>) -> (CommandService, watch::Sender<bool>) {
        service_with_store(node, Arc::new(MemoryCredentialStore::new()))
    }

    fn service_with_store(
        node: Arc<ScriptedNode>,
        store: Arc<dyn CredentialStore>,
    ) -> (CommandService, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let node_config = NodeConfig {
            default_port: 8232,
            rpc_timeout_secs: 10,
            rpc_proxy: None,
            cookie_path: None,
        };
        let transfer_config = TransferConfig {
            poll_initial_delay_ms: 0,
            poll_max_attempts: 1,
            poll_backoff_ms: 0,
            poll_max_backoff_ms: 0,
            ..TransferConfig::default()
        };
        let nodes = NodeService::new(node.clone(), store, &node_config);
        let transfers = TransferService::new(node, &transfer_config, rx);
        (CommandService::new(nodes, transfers), tx)
    }

    async fn setup_node(service: &CommandService, node: &ScriptedNode) {
        node.respond("getblockchaininfo", Ok(json!({"chain": "main", "blocks": 1500})));
        let reply = service.handle(USER, Some("miner"), "/setup host user pass").await;
        assert!(reply.contains("Node Connected Successfully!"), "{}", reply);
        assert!(reply.contains("Blocks: 1,500"));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/balance"), Command::Balance);
        assert_eq!(Command::parse("/Balance@JunoCashBot"), Command::Balance);
        assert_eq!(Command::parse("mining"), Command::Mining);
        assert_eq!(Command::parse("/shield all"), Command::Shield(Some("all".to_string())));
        assert_eq!(Command::parse("/shield"), Command::Shield(None));
        assert_eq!(
            Command::parse("/send  j1dest   2.5 "),
            Command::Send(vec!["j1dest".to_string(), "2.5".to_string()])
        );
        assert_eq!(Command::parse("/frobnicate"), Command::Unknown("frobnicate".to_string()));
        assert_eq!(Command::parse(""), Command::Unknown(String::new()));
    }

    #[tokio::test]
    async fn test_commands_before_setup_prompt_for_setup() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());

        for text in ["/balance", "/mining", "/network", "/address", "/shield all", "/confirm"] {
            let reply = service.handle(USER, None, text).await;
            assert_eq!(reply, "Please setup your node first with /setup", "{}", text);
        }
        assert!(node.methods().is_empty());
    }

    #[tokio::test]
    async fn test_setup_without_host_shows_usage() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());

        let reply = service.handle(USER, None, "/setup").await;
        assert!(reply.contains("/setup <host> [rpc_user] [rpc_password] [port]"));
        assert!(node.methods().is_empty());
    }

    #[tokio::test]
    async fn test_balance_after_setup() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());
        setup_node(&service, &node).await;

        node.respond(
            "z_gettotalbalance",
            Ok(json!({"transparent": "1.5", "private": "0.5", "total": "2.0"})),
        );
        let reply = service.handle(USER, None, "/balance").await;
        assert!(reply.contains("Transparent: 1.5 JUNO"));
        assert!(reply.contains("Private: 0.5 JUNO"));
        assert!(reply.contains("Total: 2.0 JUNO"));
    }

    #[tokio::test]
    async fn test_send_requiring_shield_stays_idle() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());
        setup_node(&service, &node).await;

        node.respond(
            "z_gettotalbalance",
            Ok(json!({"transparent": "2.0", "private": "0.5", "total": "2.5"})),
        );
        let reply = service.handle(USER, None, "/send jAddr 1.0").await;
        assert!(reply.contains("Funds Need Shielding"), "{}", reply);
        assert!(service.transfers().pending(USER).is_none());
        assert_eq!(node.calls_to("z_sendmany"), 0);
    }

    #[tokio::test]
    async fn test_send_confirm_round() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());
        setup_node(&service, &node).await;

        node.respond(
            "z_gettotalbalance",
            Ok(json!({"transparent": "0", "private": "3.0", "total": "3.0"})),
        );
        node.respond("z_listaccounts", Ok(json!([{"account": 0, "addresses": [{"ua": "j1wallet"}]}])));
        node.respond("z_sendmany", Ok(json!("opid-1")));
        node.respond(
            "z_getoperationstatus",
            Ok(json!([{"status": "success", "result": {"txid": "abc123"}}])),
        );

        let prompt = service.handle(USER, None, "/send j1dest 1.25").await;
        assert!(prompt.contains("CONFIRM TRANSACTION"), "{}", prompt);
        assert!(prompt.contains("After TX: 1.75000000 JUNO"));

        let sent = service.handle(USER, None, "/confirm").await;
        assert!(sent.contains("TX ID: abc123"), "{}", sent);
        assert_eq!(node.calls_to("z_sendmany"), 1);
        assert!(service.transfers().pending(USER).is_none());

        let again = service.handle(USER, None, "/confirm").await;
        assert_eq!(again, "No pending transaction. Use /send first.");
        assert_eq!(node.calls_to("z_sendmany"), 1);
    }

    #[tokio::test]
    async fn test_confirm_clears_pending_when_config_load_fails() {
        let node = Arc::new(ScriptedNode::new());
        let store = Arc::new(FailingStore::default());
        let (service, _tx) = service_with_store(node.clone(), store.clone());
        setup_node(&service, &node).await;

        node.respond(
            "z_gettotalbalance",
            Ok(json!({"transparent": "0", "private": "3.0", "total": "3.0"})),
        );
        node.respond("z_listaccounts", Ok(json!([{"account": 0, "addresses": [{"ua": "j1w"}]}])));
        service.handle(USER, None, "/send j1dest 1").await;
        assert!(service.transfers().pending(USER).is_some());

        store.fail_reads.store(true, Ordering::SeqCst);
        let reply = service.handle(USER, None, "/confirm").await;
        assert!(!reply.contains("TX ID"), "{}", reply);
        assert!(service.transfers().pending(USER).is_none());
        assert_eq!(node.calls_to("z_sendmany"), 0);

        store.fail_reads.store(false, Ordering::SeqCst);
        let again = service.handle(USER, None, "/confirm").await;
        assert_eq!(again, "No pending transaction. Use /send first.");
    }

    #[tokio::test]
    async fn test_same_user_commands_run_one_at_a_time() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());
        setup_node(&service, &node).await;

        node.respond("getmininginfo", Ok(json!({"generate": true, "localsolps": 10.0})));
        node.respond(
            "z_gettotalbalance",
            Ok(json!({"transparent": "0", "private": "1.0", "total": "1.0"})),
        );
        let gate = node.hold("getmininginfo");

        let mining = service.handle(USER, None, "/mining");
        let balance = async {
            while node.calls_to("getmininginfo") == 0 {
                tokio::task::yield_now().await;
            }
            service.handle(USER, None, "/balance").await
        };
        let release = async {
            while node.calls_to("getmininginfo") == 0 {
                tokio::task::yield_now().await;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            let balance_calls_while_held = node.calls_to("z_gettotalbalance");
            gate.add_permits(1);
            balance_calls_while_held
        };

        let (mining, balance, balance_calls_while_held) = tokio::join!(mining, balance, release);
        assert_eq!(balance_calls_while_held, 0);
        assert!(mining.contains("Mining Statistics"), "{}", mining);
        assert!(balance.contains("Total: 1.0 JUNO"), "{}", balance);
        assert_eq!(node.calls_to("z_gettotalbalance"), 1);
    }

    #[tokio::test]
    async fn test_other_users_are_not_blocked() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());
        setup_node(&service, &node).await;

        node.respond("getmininginfo", Ok(json!({"generate": false})));
        let gate = node.hold("getmininginfo");

        let mining = service.handle(USER, None, "/mining");
        let other = async {
            while node.calls_to("getmininginfo") == 0 {
                tokio::task::yield_now().await;
            }
            let reply = tokio::time::timeout(
                Duration::from_millis(200),
                service.handle(USER + 1, None, "/balance"),
            )
            .await;
            gate.add_permits(1);
            reply
        };

        let (_, other) = tokio::join!(mining, other);
        assert_eq!(other.unwrap(), "Please setup your node first with /setup");
    }

    #[tokio::test]
    async fn test_cancel_clears_pending() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());
        setup_node(&service, &node).await;

        node.respond(
            "z_gettotalbalance",
            Ok(json!({"transparent": "0", "private": "3.0", "total": "3.0"})),
        );
        node.respond("z_listaccounts", Ok(json!([{"account": 0, "addresses": [{"ua": "j1wallet"}]}])));

        service.handle(USER, None, "/send j1dest 1").await;
        let reply = service.handle(USER, None, "/cancel").await;
        assert!(reply.starts_with("Transaction cancelled."));
        assert!(service.transfers().pending(USER).is_none());
    }

    #[tokio::test]
    async fn test_shield_without_all_makes_no_rpc_call() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());
        setup_node(&service, &node).await;
        let calls_after_setup = node.methods().len();

        let reply = service.handle(USER, None, "/shield 5").await;
        assert!(reply.starts_with("Use: /shield all"));
        assert_eq!(node.methods().len(), calls_after_setup);
    }

    #[tokio::test]
    async fn test_rpc_failure_becomes_reply() {
        let node = Arc::new(ScriptedNode::new());
        let (service, _tx) = service(node.clone());
        setup_node(&service, &node).await;

        let reply = service.handle(USER, None, "/mining").await;
        assert!(reply.starts_with("Error: "), "{}", reply);
    }

    #[tokio::test]
    async fn test_unknown_command_points_to_help() {
        let (service, _tx) = service(Arc::new(ScriptedNode::new()));
        let reply = service.handle(USER, None, "/frobnicate").await;
        assert!(reply.contains("/help"));
    }
}
