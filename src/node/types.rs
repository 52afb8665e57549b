use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::rpc::RpcError;

/// Balances as reported by z_gettotalbalance
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BalanceSnapshot {
    #[serde(default)]
    pub transparent: Decimal,
    #[serde(default)]
    pub private: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfo {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub blocks: u64,
    #[serde(default = "default_true")]
    pub initialblockdownload: bool,
    #[serde(default)]
    pub size_on_disk: u64,
}

impl BlockchainInfo {
    pub fn is_synced(&self) -> bool {
        !self.initialblockdownload
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiningInfo {
    #[serde(default)]
    pub generate: bool,
    #[serde(default)]
    pub localsolps: f64,
    #[serde(default)]
    pub genproclimit: i64,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub networksolps: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletAccount {
    #[serde(default)]
    pub account: u32,
    #[serde(default)]
    pub addresses: Vec<AccountAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountAddress {
    pub ua: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnspentOutput {
    pub address: String,
}

/// One recipient of z_sendmany; the node wants the amount as a JSON number
#[derive(Debug, Clone, Serialize)]
pub struct Recipient {
    pub address: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Entry of z_getoperationstatus
#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub result: Option<OperationResult>,
    #[serde(default)]
    pub error: Option<OperationFailure>,
}

fn default_status() -> String {
    "pending".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationResult {
    pub txid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationFailure {
    #[serde(default)]
    pub message: Option<String>,
}

/// Deserializes an RPC result into `T`, naming the method on failure
pub fn parse_result<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::Unexpected {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
