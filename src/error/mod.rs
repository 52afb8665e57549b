use actix_web::{HttpResponse, ResponseError};
use rust_decimal::Decimal;
use std::fmt;

use crate::node::RpcError;

#[derive(Debug)]
pub enum AppError {
    // Session errors
    ConfigMissing,
    Unauthorized(String),

    // Validation errors
    ValidationError(String),
    FullShieldRequired,

    // Node errors
    Rpc(RpcError),
    BalanceUnavailable(RpcError),
    ConnectionFailed {
        host: String,
        port: u16,
        source: RpcError,
    },
    CookieUnavailable {
        path: String,
        reason: String,
    },
    NoAccountsFound,
    NoUtxosFound,

    // Transfer workflow errors
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    ShieldingRequired {
        transparent: Decimal,
        private: Decimal,
    },
    NoPendingTransaction,
    ShieldSubmitFailed(RpcError),
    SendSubmitFailed(RpcError),

    // Storage errors
    EncryptionError(String),
    DatabaseError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ConfigMissing => write!(f, "No node configured for this user"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::FullShieldRequired => {
                write!(f, "Only full shielding is supported; use `shield all`")
            }
            AppError::Rpc(err) => write!(f, "{}", err),
            AppError::BalanceUnavailable(err) => write!(f, "Balance unavailable: {}", err),
            AppError::ConnectionFailed { host, port, source } => {
                write!(f, "Failed to connect to node at {}:{}: {}", host, port, source)
            }
            AppError::CookieUnavailable { path, reason } => {
                write!(f, "Could not read cookie file at {}: {}", path, reason)
            }
            AppError::NoAccountsFound => write!(f, "No wallet accounts found"),
            AppError::NoUtxosFound => write!(f, "No transparent UTXOs found"),
            AppError::InsufficientFunds { available, requested } => write!(
                f,
                "Insufficient balance. Required: {}, Available: {}",
                requested, available
            ),
            AppError::ShieldingRequired { transparent, private } => write!(
                f,
                "Funds need shielding first (transparent {}, private {})",
                transparent, private
            ),
            AppError::NoPendingTransaction => write!(f, "No pending transaction"),
            AppError::ShieldSubmitFailed(err) => write!(f, "Shielding failed: {}", err),
            AppError::SendSubmitFailed(err) => write!(f, "Transaction failed: {}", err),
            AppError::EncryptionError(msg) => write!(f, "Encryption error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_message = serde_json::json!({
            "error": self.to_string()
        });

        match self {
            AppError::Unauthorized(_) => HttpResponse::Unauthorized().json(error_message),
            AppError::ValidationError(_) => HttpResponse::BadRequest().json(error_message),
            _ => HttpResponse::InternalServerError().json(error_message),
        }
    }
}

impl From<RpcError> for AppError {
    fn from(err: RpcError) -> Self {
        AppError::Rpc(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::DatabaseError(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
