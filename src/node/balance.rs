use serde_json::json;
use std::sync::Arc;

use super::rpc::{NodeEndpoint, NodeRpc};
use super::types::{parse_result, BalanceSnapshot};
use crate::error::{AppError, AppResult};

/// Fresh balance reads; nothing is cached between commands
pub struct BalanceOracle {
    rpc: Arc<dyn NodeRpc>,
}

impl BalanceOracle {
    pub fn new(rpc: Arc<dyn NodeRpc>) -> Self {
        Self { rpc }
    }

    pub async fn total_balance(&self, endpoint: &NodeEndpoint) -> AppResult<BalanceSnapshot> {
        let value = self
            .rpc
            .call(endpoint, "z_gettotalbalance", json!([]))
            .await
            .map_err(AppError::BalanceUnavailable)?;

        let snapshot: BalanceSnapshot =
            parse_result("z_gettotalbalance", value).map_err(AppError::BalanceUnavailable)?;

        tracing::debug!(
            "Balance for {}: transparent={}, private={}, total={}",
            endpoint.host,
            snapshot.transparent,
            snapshot.private,
            snapshot.total
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::testing::{endpoint, ScriptedNode};
    use crate::node::RpcError;

    #[tokio::test]
    async fn test_total_balance() {
        let node = Arc::new(ScriptedNode::new());
        node.respond(
            "z_gettotalbalance",
            Ok(json!({"transparent": "1.5", "private": "0.5", "total": "2.0"})),
        );
        let oracle = BalanceOracle::new(node.clone());

        let snapshot = oracle.total_balance(&endpoint()).await.unwrap();
        assert_eq!(snapshot.total.to_string(), "2.0");
        assert_eq!(node.calls_to("z_gettotalbalance"), 1);
    }

    #[tokio::test]
    async fn test_rpc_failure_is_balance_unavailable() {
        let node = Arc::new(ScriptedNode::new());
        node.respond("z_gettotalbalance", Err(RpcError::AuthFailure));
        let oracle = BalanceOracle::new(node);

        let err = oracle.total_balance(&endpoint()).await.unwrap_err();
        assert!(matches!(err, AppError::BalanceUnavailable(RpcError::AuthFailure)));
    }
}
