use serde_json::json;
use std::sync::Arc;

use super::rpc::{NodeEndpoint, NodeRpc};
use super::types::{parse_result, UnspentOutput, WalletAccount};
use crate::error::{AppError, AppResult};

/// Confirmation window passed to listunspent
const UNSPENT_MIN_CONF: u32 = 1;
const UNSPENT_MAX_CONF: u32 = 9_999_999;

/// A unified address together with the account that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAddressEntry {
    pub account: u32,
    pub address: String,
}

pub struct AccountResolver {
    rpc: Arc<dyn NodeRpc>,
}

impl AccountResolver {
    pub fn new(rpc: Arc<dyn NodeRpc>) -> Self {
        Self { rpc }
    }

    /// Every unified address known to the wallet, in account order
    pub async fn unified_addresses(&self, endpoint: &NodeEndpoint) -> AppResult<Vec<AccountAddressEntry>> {
        let value = self.rpc.call(endpoint, "z_listaccounts", json!([])).await?;
        let accounts: Vec<WalletAccount> = parse_result("z_listaccounts", value)?;

        if accounts.is_empty() {
            return Err(AppError::NoAccountsFound);
        }

        let entries = accounts
            .into_iter()
            .flat_map(|account| {
                let number = account.account;
                account.addresses.into_iter().map(move |addr| AccountAddressEntry {
                    account: number,
                    address: addr.ua.unwrap_or_else(|| "N/A".to_string()),
                })
            })
            .collect();

        Ok(entries)
    }

    /// First unified address of the first account; the shielded endpoint of the wallet
    pub async fn first_unified_address(&self, endpoint: &NodeEndpoint) -> AppResult<String> {
        let value = self.rpc.call(endpoint, "z_listaccounts", json!([])).await?;
        let accounts: Vec<WalletAccount> = parse_result("z_listaccounts", value)?;

        accounts
            .into_iter()
            .next()
            .and_then(|account| account.addresses.into_iter().next())
            .and_then(|addr| addr.ua)
            .ok_or(AppError::NoAccountsFound)
    }

    /// Address of the first spendable transparent output
    pub async fn first_utxo_address(&self, endpoint: &NodeEndpoint) -> AppResult<String> {
        let value = self
            .rpc
            .call(endpoint, "listunspent", json!([UNSPENT_MIN_CONF, UNSPENT_MAX_CONF]))
            .await?;
        let unspent: Vec<UnspentOutput> = parse_result("listunspent", value)?;

        tracing::debug!("Found {} UTXOs on {}", unspent.len(), endpoint.host);

        unspent
            .into_iter()
            .next()
            .map(|utxo| utxo.address)
            .ok_or(AppError::NoUtxosFound)
    }
}
