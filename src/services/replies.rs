//! Text rendering of command results. Every reply the transport sends back is
//! built here.

use crate::error::AppError;
use crate::node::accounts::AccountAddressEntry;
use crate::node::types::MiningInfo;
use crate::node::{BalanceSnapshot, OperationReport, RpcError};
use crate::services::node_service::{NetworkStatus, SetupOutcome};
use crate::services::pending::PendingTransaction;
use crate::services::transfer_service::{SendOutcome, SendPrompt, ShieldOutcome};

const TICKER: &str = "JUNO";
const ADDRESS_PREVIEW_CHARS: usize = 40;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn welcome() -> String {
    "Welcome to Juno Cash Bot!\n\n\
     Monitor and manage your Juno Cash node from chat.\n\n\
     First step:\n\
     Configure your node connection with /setup\n\n\
     Available commands:\n\
     /balance - Check wallet balance\n\
     /shield - Shield funds to private\n\
     /send - Send JUNO privately\n\
     /mining - Mining statistics\n\
     /network - Network info\n\
     /address - Your addresses\n\n\
     Send /help for the complete guide."
        .to_string()
}

pub fn help() -> String {
    "Juno Cash Bot - Complete Guide\n\n\
     Setup commands:\n\
     /setup localhost\n\
     -> reads credentials from the node's .cookie file\n\
     /setup <host> <rpcuser> <rpcpassword> [port]\n\
     -> remote node, port defaults to 8232\n\n\
     Monitoring commands:\n\
     /balance - Check your JUNO balance\n\
     /mining - Mining stats (hashrate, difficulty, network share)\n\
     /network - Blockchain info (height, connections, sync status)\n\
     /address - List your wallet addresses\n\n\
     Transaction commands:\n\
     /shield all - Shield all transparent funds to the private pool\n\
     /send <address> <amount> - Send JUNO privately\n\
     /confirm - Confirm pending transaction\n\
     /cancel - Cancel pending transaction\n\n\
     How to send JUNO:\n\
     1. /shield all\n\
     2. Wait for confirmation (~1-2 min)\n\
     3. /send j1abc... 2\n\
     4. /confirm\n\n\
     Why shield?\n\
     Protocol NU6.1 requires transparent funds (mining rewards included) to be \
     shielded entirely before they can be sent.\n\n\
     Finding RPC credentials:\n\
     Linux: ~/.junocash/.cookie or ~/.junocash/junocash.conf\n\
     Windows: %APPDATA%\\JunoCash\\.cookie or %APPDATA%\\JunoCash\\junocash.conf\n\
     Look for rpcuser= and rpcpassword=\n\n\
     Security:\n\
     RPC passwords are encrypted at rest when the bot runs with database storage.\n\
     Each user has an isolated configuration.\n\n\
     Troubleshooting:\n\
     1. Make sure junocashd is running\n\
     2. Check RPC is enabled in its config\n\
     3. Verify the credentials\n\
     4. For a VPS, ensure the RPC port is reachable"
        .to_string()
}

pub fn setup_usage() -> String {
    "Setup your node connection\n\n\
     Usage:\n\
     /setup <host> [rpc_user] [rpc_password] [port]\n\n\
     Examples:\n\
     /setup localhost - read credentials from the .cookie file\n\
     /setup localhost __cookie__ password - manual credentials\n\
     /setup 185.188.249.238 user pass 8232 - remote VPS"
        .to_string()
}

pub fn send_usage() -> String {
    "Send JUNO\n\n\
     Usage:\n\
     /send <address> <amount>\n\n\
     Example:\n\
     /send j1abc123... 5.5\n\n\
     Transparent funds must be shielded first with /shield all."
        .to_string()
}

pub fn shield_guidance() -> String {
    "Use: /shield all\n\n\
     Why?\n\
     Protocol NU6.1 requires complete shielding.\n\
     Mining rewards must be shielded entirely, partial amounts are not accepted.\n\
     Funds move to the private pool (Orchard)."
        .to_string()
}

pub fn unknown_command(name: &str) -> String {
    if name.is_empty() {
        "Send a command, or /help to list them.".to_string()
    } else {
        format!("Unknown command: /{}\nSend /help to list the available commands.", name)
    }
}

pub fn setup_success(outcome: &SetupOutcome) -> String {
    let mut text = String::new();
    if let Some(user) = &outcome.cookie_user {
        text.push_str(&format!("Auto-detected credentials\nUser: {}\n\n", user));
    }
    text.push_str(&format!(
        "Node Connected Successfully!\n\n\
         Host: {}:{}\n\
         Chain: {}\n\
         Blocks: {}\n\
         Status: {}\n\n\
         Use /balance to check your JUNO balance!",
        outcome.config.host,
        outcome.config.port,
        outcome.chain.chain.as_deref().unwrap_or("unknown"),
        group_thousands(outcome.chain.blocks),
        if outcome.chain.is_synced() { "Synced" } else { "Syncing..." },
    ));
    text
}

/// Amounts are shown exactly as the node reported them
pub fn balance(snapshot: &BalanceSnapshot) -> String {
    format!(
        "Your JUNO Balance\n\n\
         Transparent: {} {}\n\
         Private: {} {}\n\
         Total: {} {}",
        snapshot.transparent, TICKER, snapshot.private, TICKER, snapshot.total, TICKER
    )
}

pub fn mining(info: &MiningInfo) -> String {
    let share = if info.networksolps > 0.0 {
        info.localsolps / info.networksolps * 100.0
    } else {
        0.0
    };

    format!(
        "Mining Statistics\n\n\
         Status: {}\n\
         Hashrate: {:.2} H/s\n\
         Threads: {}\n\
         Difficulty: {}\n\n\
         Network Hashrate: {:.2} MH/s\n\
         Your Share: {:.4}%",
        if info.generate { "Active" } else { "Inactive" },
        info.localsolps,
        info.genproclimit,
        group_decimal(info.difficulty),
        info.networksolps / 1_000_000.0,
        share
    )
}

pub fn network(status: &NetworkStatus) -> String {
    format!(
        "Network Information\n\n\
         Chain: {}\n\
         Block Height: {}\n\
         Sync Status: {}\n\
         Connections: {}\n\
         Chain Size: {:.2} GB",
        status.chain.chain.as_deref().unwrap_or("mainnet"),
        group_thousands(status.chain.blocks),
        if status.chain.is_synced() { "Synced" } else { "Syncing..." },
        status.peers,
        status.chain.size_on_disk as f64 / BYTES_PER_GB
    )
}

pub fn addresses(entries: &[AccountAddressEntry]) -> String {
    if entries.is_empty() {
        return no_accounts();
    }

    let mut text = String::from("Your Addresses\n");
    for entry in entries {
        text.push_str(&format!("\nAccount {}:\n{}\n", entry.account, entry.address));
    }
    text
}

pub fn shield(outcome: &ShieldOutcome) -> String {
    match outcome {
        ShieldOutcome::NothingToShield { balance } => format!(
            "No transparent funds to shield.\n\n\
             Transparent: {} {}\n\
             Private: {} {}",
            balance.transparent, TICKER, balance.private, TICKER
        ),
        ShieldOutcome::BelowFeeReserve { balance, fee_reserve } => format!(
            "Transparent balance too small to shield.\n\n\
             Transparent: {} {}\n\
             Fee reserve: {} {}\n\n\
             Wait for more funds, then try /shield all again.",
            balance.transparent, TICKER, fee_reserve, TICKER
        ),
        ShieldOutcome::Submitted {
            amount,
            declared_fee,
            report,
        } => {
            let header = format!(
                "Shielding All Transparent Funds\n\
                 Amount: {:.8} {}\n\
                 Fee: ~{} {}\n\n",
                amount, TICKER, declared_fee, TICKER
            );
            let body = match report {
                OperationReport::Completed { txid, .. } => format!(
                    "Shielding Successful!\n\n\
                     TX ID: {}\n\n\
                     Waiting for confirmation (~1-2 min)...\n\
                     After confirmation, you can send private transactions with /send",
                    txid
                ),
                OperationReport::Failed { message, .. } => {
                    format!("Shielding failed!\n\nError: {}", message)
                }
                OperationReport::TimedOut {
                    operation_id,
                    last_status,
                } => format!(
                    "Shielding Transaction Processing\n\n\
                     Status: {}\n\
                     Operation ID: {}\n\n\
                     Use /balance to check when funds are confirmed.",
                    last_status, operation_id
                ),
                OperationReport::Unconfirmed { operation_id } => format!(
                    "Shielding Transaction Submitted\n\n\
                     Operation ID: {}\n\n\
                     Wait for 1 confirmation (~1-2 min), then check your balance with /balance",
                    operation_id
                ),
            };
            header + &body
        }
    }
}

pub fn send_prompt(prompt: &SendPrompt) -> String {
    format!(
        "CONFIRM TRANSACTION\n\n\
         From: Your private balance (shielded)\n\
         To: {}\n\
         Amount: {} {}\n\
         Fee: ~{} {}\n\n\
         Balance:\n\
         Private: {} {}\n\
         After TX: {:.8} {}\n\n\
         This action is irreversible!\n\n\
         Reply with /confirm to proceed or /cancel to abort.",
        preview(&prompt.pending.destination_address),
        prompt.pending.amount,
        TICKER,
        prompt.declared_fee,
        TICKER,
        prompt.private_balance,
        TICKER,
        prompt.remaining_private,
        TICKER
    )
}

pub fn send_outcome(outcome: &SendOutcome) -> String {
    let pending = &outcome.pending;
    match &outcome.report {
        OperationReport::Completed { txid, .. } => format!(
            "Transaction Sent!\n\n\
             Amount: {} {}\n\
             To: {}\n\
             TX ID: {}\n\n\
             This is a private transaction, fully shielded.",
            pending.amount,
            TICKER,
            preview(&pending.destination_address),
            txid
        ),
        OperationReport::Failed { message, .. } => {
            format!("Transaction failed!\n\nError: {}", message)
        }
        OperationReport::TimedOut {
            operation_id,
            last_status,
        } => format!(
            "Transaction Processing\n\n\
             Status: {}\n\
             Operation ID: {}\n\n\
             The node is still processing it, check again later.",
            last_status, operation_id
        ),
        OperationReport::Unconfirmed { operation_id } => format!(
            "Transaction submitted!\n\n\
             Operation ID: {}\n\n\
             Check status in a few moments.",
            operation_id
        ),
    }
}

pub fn cancelled(pending: &PendingTransaction) -> String {
    format!(
        "Transaction cancelled.\n\n{} {} to {} was not sent.",
        pending.amount,
        TICKER,
        preview(&pending.destination_address)
    )
}

/// User-facing text for a failed command
pub fn error(err: &AppError) -> String {
    match err {
        AppError::ConfigMissing => "Please setup your node first with /setup".to_string(),
        AppError::ValidationError(msg) => msg.clone(),
        AppError::FullShieldRequired => shield_guidance(),
        AppError::Rpc(e) => format!("Error: {}", e),
        AppError::BalanceUnavailable(e) => format!(
            "Cannot check balance. Make sure node is running.\n\nError: {}",
            e
        ),
        AppError::ConnectionFailed { host, port, source } => format!(
            "Failed to connect to node at {}:{}\n\
             Error: {}\n\n\
             Check that junocashd is running, RPC is enabled and the credentials are correct.",
            host, port, source
        ),
        AppError::CookieUnavailable { path, reason } => format!(
            "Could not read cookie file at {}\nError: {}\n\
             Please provide credentials manually:\n\
             /setup <host> <user> <password> [port]",
            path, reason
        ),
        AppError::NoAccountsFound => no_accounts(),
        AppError::NoUtxosFound => "No transparent UTXOs found".to_string(),
        AppError::InsufficientFunds { available, requested } => format!(
            "Insufficient balance!\n\n\
             Available: {} {}\n\
             Requested: {} {}",
            available, TICKER, requested, TICKER
        ),
        AppError::ShieldingRequired { transparent, private } => format!(
            "Funds Need Shielding\n\n\
             Transparent: {} {}\n\
             Private: {} {}\n\n\
             Shield your transparent funds first:\n\
             /shield all\n\n\
             After shielding completes (~1-2 min), you can send private transactions.",
            transparent, TICKER, private, TICKER
        ),
        AppError::NoPendingTransaction => "No pending transaction. Use /send first.".to_string(),
        AppError::ShieldSubmitFailed(e) => format!(
            "Shielding failed!\n\n\
             Error: {}\n\n\
             Tip: Make sure your transparent funds are confirmed \
             (coinbase outputs need 100 confirmations)",
            rpc_detail(e)
        ),
        AppError::SendSubmitFailed(e) => format!(
            "Transaction failed!\n\n\
             Error: {}\n\n\
             Possible causes:\n\
             - Funds not yet shielded (use /shield all first)\n\
             - Previous shielding not confirmed yet\n\
             - Insufficient private balance",
            rpc_detail(e)
        ),
        AppError::Unauthorized(_)
        | AppError::EncryptionError(_)
        | AppError::DatabaseError(_)
        | AppError::ConfigError(_) => {
            "Something went wrong on the bot side. Please try again later.".to_string()
        }
    }
}

fn no_accounts() -> String {
    "No accounts found. Create one with:\n./junocash-cli z_getnewaccount".to_string()
}

/// Node messages are shown bare; transport failures keep their category
fn rpc_detail(err: &RpcError) -> String {
    match err {
        RpcError::NodeError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn preview(address: &str) -> String {
    if address.chars().count() > ADDRESS_PREVIEW_CHARS {
        let head: String = address.chars().take(ADDRESS_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        address.to_string()
    }
}

/// 1234567 -> "1,234,567"
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Two decimals with grouped integer part: 12345.678 -> "12,345.68"
pub fn group_decimal(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let int_value: u64 = int_part.parse().unwrap_or(0);
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, group_thousands(int_value), frac_part)
}
