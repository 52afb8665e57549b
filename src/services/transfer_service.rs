use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::TransferConfig;
use crate::error::{AppError, AppResult};
use crate::node::types::{parse_result, Recipient};
use crate::node::{
    AccountResolver, BalanceOracle, BalanceSnapshot, NodeEndpoint, NodeRpc, OperationPoller,
    OperationReport, PollPolicy, RpcError,
};
use crate::services::pending::{PendingStore, PendingTransaction};
use crate::store::{UserId, UserNodeConfig};

/// z_sendmany privacy policy needed when the source is a transparent address
const ALLOW_FULLY_TRANSPARENT: &str = "AllowFullyTransparent";

#[derive(Debug, Clone)]
pub struct FeeSchedule {
    pub fee_reserve: Decimal,
    pub declared_fee: Decimal,
    pub min_confirmations: u32,
}

impl From<&TransferConfig> for FeeSchedule {
    fn from(config: &TransferConfig) -> Self {
        Self {
            fee_reserve: config.fee_reserve,
            declared_fee: config.declared_fee,
            min_confirmations: config.min_confirmations,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShieldOutcome {
    NothingToShield {
        balance: BalanceSnapshot,
    },
    /// Transparent funds exist but do not exceed the fee reserve
    BelowFeeReserve {
        balance: BalanceSnapshot,
        fee_reserve: Decimal,
    },
    Submitted {
        amount: Decimal,
        declared_fee: Decimal,
        report: OperationReport,
    },
}

/// What the user is asked to confirm after `send`
#[derive(Debug, Clone, PartialEq)]
pub struct SendPrompt {
    pub pending: PendingTransaction,
    pub declared_fee: Decimal,
    pub private_balance: Decimal,
    pub remaining_private: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub pending: PendingTransaction,
    pub report: OperationReport,
}

/// Shield and send/confirm/cancel workflow. Callers serialize commands per
/// user; this type only guarantees one pending transaction per user.
pub struct TransferService {
    rpc: Arc<dyn NodeRpc>,
    balances: BalanceOracle,
    accounts: AccountResolver,
    poller: OperationPoller,
    pending: PendingStore,
    fees: FeeSchedule,
}

impl TransferService {
    pub fn new(rpc: Arc<dyn NodeRpc>, config: &TransferConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            balances: BalanceOracle::new(rpc.clone()),
            accounts: AccountResolver::new(rpc.clone()),
            poller: OperationPoller::new(rpc.clone(), PollPolicy::from(config), shutdown),
            pending: PendingStore::new(),
            fees: FeeSchedule::from(config),
            rpc,
        }
    }

    /// Moves every transparent coin into the shielded pool
    pub async fn shield(
        &self,
        user_id: UserId,
        config: &UserNodeConfig,
        argument: Option<&str>,
    ) -> AppResult<ShieldOutcome> {
        match argument {
            Some(arg) if arg.eq_ignore_ascii_case("all") => {}
            _ => return Err(AppError::FullShieldRequired),
        }

        let endpoint = config.endpoint();
        let balance = self.balances.total_balance(&endpoint).await?;

        if balance.transparent.is_zero() {
            return Ok(ShieldOutcome::NothingToShield { balance });
        }

        let amount = balance.transparent - self.fees.fee_reserve;
        if amount <= Decimal::ZERO {
            tracing::info!(
                "User {} has {} transparent, not enough to cover the {} reserve",
                user_id,
                balance.transparent,
                self.fees.fee_reserve
            );
            return Ok(ShieldOutcome::BelowFeeReserve {
                balance,
                fee_reserve: self.fees.fee_reserve,
            });
        }

        let source = self.accounts.first_utxo_address(&endpoint).await?;
        let destination = self.accounts.first_unified_address(&endpoint).await?;

        tracing::info!("User {} shielding {} from {}", user_id, amount, source);

        let params = self.sendmany_params(&source, &destination, amount, true);
        let operation_id = self
            .submit(&endpoint, params)
            .await
            .map_err(AppError::ShieldSubmitFailed)?;

        let report = self.poller.await_operation(&endpoint, &operation_id).await;

        Ok(ShieldOutcome::Submitted {
            amount,
            declared_fee: self.fees.declared_fee,
            report,
        })
    }

    /// Validates a private send and parks it until confirm/cancel
    pub async fn send(
        &self,
        user_id: UserId,
        config: &UserNodeConfig,
        destination: &str,
        amount: &str,
    ) -> AppResult<SendPrompt> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(AppError::ValidationError("Destination address is required".to_string()));
        }
        let amount = parse_amount(amount)?;

        let endpoint = config.endpoint();
        let balance = self.balances.total_balance(&endpoint).await?;

        if amount > balance.total {
            return Err(AppError::InsufficientFunds {
                available: balance.total,
                requested: amount,
            });
        }

        // Transparent funds cannot be sent privately until fully shielded
        if balance.private < amount && balance.transparent > Decimal::ZERO {
            return Err(AppError::ShieldingRequired {
                transparent: balance.transparent,
                private: balance.private,
            });
        }

        let source = self.accounts.first_unified_address(&endpoint).await?;

        let pending = PendingTransaction {
            source_address: source,
            destination_address: destination.to_string(),
            amount,
        };
        if self.pending.replace(user_id, pending.clone()).is_some() {
            tracing::info!("User {} replaced an unconfirmed transaction", user_id);
        }
        tracing::info!("User {} staged send of {} to {}", user_id, amount, destination);

        Ok(SendPrompt {
            pending,
            declared_fee: self.fees.declared_fee,
            private_balance: balance.private,
            remaining_private: balance.private - amount,
        })
    }

    /// Removes the staged transaction; `confirm` clears it before anything can fail
    pub fn take_pending(&self, user_id: UserId) -> Option<PendingTransaction> {
        self.pending.take(user_id)
    }

    /// Submits a transaction already taken with `take_pending`
    pub async fn confirm(
        &self,
        user_id: UserId,
        pending: PendingTransaction,
        config: &UserNodeConfig,
    ) -> AppResult<SendOutcome> {
        let endpoint = config.endpoint();

        tracing::info!(
            "User {} confirmed send of {} to {}",
            user_id,
            pending.amount,
            pending.destination_address
        );

        let params = self.sendmany_params(
            &pending.source_address,
            &pending.destination_address,
            pending.amount,
            false,
        );
        let operation_id = self
            .submit(&endpoint, params)
            .await
            .map_err(AppError::SendSubmitFailed)?;

        let report = self.poller.await_operation(&endpoint, &operation_id).await;
        Ok(SendOutcome { pending, report })
    }

    pub fn cancel(&self, user_id: UserId) -> AppResult<PendingTransaction> {
        let pending = self.pending.take(user_id).ok_or(AppError::NoPendingTransaction)?;
        tracing::info!("User {} cancelled pending transaction", user_id);
        Ok(pending)
    }

    #[cfg(test)]
    pub fn pending(&self, user_id: UserId) -> Option<PendingTransaction> {
        self.pending.get(user_id)
    }

    fn sendmany_params(&self, source: &str, destination: &str, amount: Decimal, from_transparent: bool) -> Value {
        let recipients = vec![Recipient {
            address: destination.to_string(),
            amount,
        }];
        let fee = self.fees.declared_fee.to_f64().unwrap_or(0.0);

        if from_transparent {
            json!([source, recipients, self.fees.min_confirmations, fee, ALLOW_FULLY_TRANSPARENT])
        } else {
            json!([source, recipients, self.fees.min_confirmations, fee])
        }
    }

    /// Submits z_sendmany and returns the operation id
    async fn submit(&self, endpoint: &NodeEndpoint, params: Value) -> Result<String, RpcError> {
        let value = self.rpc.call(endpoint, "z_sendmany", params).await?;
        let operation_id: String = parse_result("z_sendmany", value)?;
        tracing::info!("z_sendmany accepted as {}", operation_id);
        Ok(operation_id)
    }
}

/// Positive decimal amount, as typed by the user
pub fn parse_amount(raw: &str) -> AppResult<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| AppError::ValidationError("Invalid amount. Use format: 5.5".to_string()))?;

    if amount <= Decimal::ZERO {
        return Err(AppError::ValidationError("Amount must be greater than 0".to_string()));
    }

    Ok(amount)
}
