use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::rpc::{NodeEndpoint, NodeRpc, RpcError};
use super::types::{parse_result, OperationStatus};
use crate::config::TransferConfig;

/// How long and how often an asynchronous wallet operation is polled
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl From<&TransferConfig> for PollPolicy {
    fn from(config: &TransferConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.poll_initial_delay_ms),
            max_attempts: config.poll_max_attempts.max(1),
            backoff_base: Duration::from_millis(config.poll_backoff_ms),
            backoff_max: Duration::from_millis(config.poll_max_backoff_ms),
        }
    }
}

/// Where an operation stood when polling stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationReport {
    Completed { operation_id: String, txid: String },
    Failed { operation_id: String, message: String },
    /// The node still reported the operation as running after the last poll
    TimedOut { operation_id: String, last_status: String },
    /// No status could be read (node unreachable or polling interrupted)
    Unconfirmed { operation_id: String },
}

/// Exponential backoff with jitter (0 to 10% of the delay)
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

pub struct OperationPoller {
    rpc: Arc<dyn NodeRpc>,
    policy: PollPolicy,
    shutdown: watch::Receiver<bool>,
}

impl OperationPoller {
    pub fn new(rpc: Arc<dyn NodeRpc>, policy: PollPolicy, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            rpc,
            policy,
            shutdown,
        }
    }

    /// Polls z_getoperationstatus until a terminal status, the attempt budget
    /// runs out, or shutdown is signalled.
    pub async fn await_operation(&self, endpoint: &NodeEndpoint, operation_id: &str) -> OperationReport {
        let mut shutdown = self.shutdown.clone();
        let mut last_status: Option<String> = None;

        for attempt in 0..self.policy.max_attempts {
            let delay = if attempt == 0 {
                self.policy.initial_delay
            } else {
                calculate_backoff(attempt, self.policy.backoff_base, self.policy.backoff_max)
            };

            if *shutdown.borrow() {
                return Self::interrupted(operation_id, last_status);
            }
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_signalled(&mut shutdown) => {
                        tracing::warn!("Polling of {} interrupted by shutdown", operation_id);
                        return Self::interrupted(operation_id, last_status);
                    }
                }
            }

            match self.poll_once(endpoint, operation_id).await {
                Ok(Some(status)) => match status.status.as_str() {
                    "success" => {
                        let txid = status
                            .result
                            .and_then(|r| r.txid)
                            .unwrap_or_else(|| "N/A".to_string());
                        tracing::info!("Operation {} succeeded: {}", operation_id, txid);
                        return OperationReport::Completed {
                            operation_id: operation_id.to_string(),
                            txid,
                        };
                    }
                    "failed" => {
                        let message = status
                            .error
                            .and_then(|e| e.message)
                            .unwrap_or_else(|| "Unknown error".to_string());
                        tracing::warn!("Operation {} failed: {}", operation_id, message);
                        return OperationReport::Failed {
                            operation_id: operation_id.to_string(),
                            message,
                        };
                    }
                    other => {
                        tracing::debug!(
                            "Operation {} is {} (attempt {}/{})",
                            operation_id,
                            other,
                            attempt + 1,
                            self.policy.max_attempts
                        );
                        last_status = Some(other.to_string());
                    }
                },
                Ok(None) => last_status = Some("pending".to_string()),
                Err(e) => {
                    tracing::warn!("Status poll for {} failed: {}", operation_id, e);
                }
            }
        }

        Self::interrupted(operation_id, last_status)
    }

    async fn poll_once(
        &self,
        endpoint: &NodeEndpoint,
        operation_id: &str,
    ) -> Result<Option<OperationStatus>, RpcError> {
        let value = self
            .rpc
            .call(endpoint, "z_getoperationstatus", json!([[operation_id]]))
            .await?;
        let statuses: Vec<OperationStatus> = parse_result("z_getoperationstatus", value)?;
        Ok(statuses.into_iter().next())
    }

    fn interrupted(operation_id: &str, last_status: Option<String>) -> OperationReport {
        match last_status {
            Some(last_status) => OperationReport::TimedOut {
                operation_id: operation_id.to_string(),
                last_status,
            },
            None => OperationReport::Unconfirmed {
                operation_id: operation_id.to_string(),
            },
        }
    }
}

/// Resolves once shutdown is requested; never if the sender is gone
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}
