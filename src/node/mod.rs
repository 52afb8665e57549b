pub mod accounts;
pub mod balance;
pub mod cookie;
pub mod operations;
pub mod rpc;
pub mod types;

pub use accounts::AccountResolver;
pub use balance::BalanceOracle;
pub use operations::{OperationPoller, OperationReport, PollPolicy};
pub use rpc::{NodeEndpoint, NodeRpc, RpcClient, RpcError};
pub use types::BalanceSnapshot;

#[cfg(test)]
pub mod testing;
