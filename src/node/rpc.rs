use async_trait::async_trait;
use reqwest::{Proxy, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::NodeConfig;

/// Request id sent with every call so node logs can attribute traffic to the bot
pub const RPC_CLIENT_ID: &str = "juno_bot";

/// Bytes of a non-200 body kept in the error
const BODY_PREFIX_LEN: usize = 100;

/// Errors raised while talking to a node
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("Authentication failed. Check RPC credentials (use cookie from .cookie file)")]
    AuthFailure,
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },
    #[error("Invalid JSON response: {0}")]
    DecodeError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("RPC error {code}: {message}")]
    NodeError { code: i64, message: String },
    #[error("Node returned no result")]
    MissingResult,
    #[error("Unexpected {method} response: {reason}")]
    Unexpected { method: String, reason: String },
}

/// Where and how to reach one user's node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoint {
    pub host: String,
    pub port: u16,
    pub rpc_user: String,
    pub rpc_password: String,
}

impl NodeEndpoint {
    pub fn url(&self) -> Result<url::Url, RpcError> {
        // IPv6 literals need brackets in the authority
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        url::Url::parse(&format!("http://{}:{}", host, self.port))
            .map_err(|e| RpcError::NetworkError(format!("Invalid node address: {}", e)))
    }

    /// Basic auth is only sent when both halves are present
    fn credentials(&self) -> Option<(&str, &str)> {
        if self.rpc_user.is_empty() || self.rpc_password.is_empty() {
            None
        } else {
            Some((self.rpc_user.as_str(), self.rpc_password.as_str()))
        }
    }
}

/// Seam between the services and the wire
#[async_trait]
pub trait NodeRpc: Send + Sync {
    async fn call(&self, endpoint: &NodeEndpoint, method: &str, params: Value)
        -> Result<Value, RpcError>;
}

// JSON-RPC request/response types
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct RpcClient {
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(config: &NodeConfig) -> Result<Self, RpcError> {
        let mut client_builder = reqwest::Client::builder().timeout(config.rpc_timeout());

        if let Some(proxy) = &config.rpc_proxy {
            if !proxy.is_empty() {
                let proxy = Proxy::all(proxy)
                    .map_err(|e| RpcError::NetworkError(format!("Invalid proxy URL: {}", e)))?;
                client_builder = client_builder.proxy(proxy);
                tracing::info!("Node RPC proxy enabled");
            }
        }

        let http = client_builder
            .build()
            .map_err(|e| RpcError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Node RPC client ready (timeout {}s)", config.rpc_timeout_secs);
        Ok(Self { http })
    }

    #[cfg(test)]
    fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("http client"),
        }
    }
}

#[async_trait]
impl NodeRpc for RpcClient {
    async fn call(
        &self,
        endpoint: &NodeEndpoint,
        method: &str,
        params: Value,
    ) -> Result<Value, RpcError> {
        let start = std::time::Instant::now();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: RPC_CLIENT_ID,
            method,
            params,
        };

        let mut request_builder = self.http.post(endpoint.url()?);
        if let Some((user, pass)) = endpoint.credentials() {
            request_builder = request_builder.basic_auth(user, Some(pass));
        }

        let response = request_builder.json(&request).send().await.map_err(|e| {
            tracing::error!("RPC {} to {}:{} failed: {}", method, endpoint.host, endpoint.port, e);
            RpcError::NetworkError(e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!("RPC {} body read failed: {}", method, e);
            RpcError::NetworkError(e.to_string())
        })?;

        tracing::info!(
            "RPC call {} returned ({}, {}ms): {}",
            method,
            status.as_u16(),
            start.elapsed().as_millis(),
            body
        );

        classify_response(status, &body)
    }
}

/// Maps an HTTP status and raw body to the call's result
pub fn classify_response(status: StatusCode, body: &str) -> Result<Value, RpcError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(RpcError::AuthFailure);
    }
    if status != StatusCode::OK {
        return Err(RpcError::HttpError {
            status: status.as_u16(),
            body: body.chars().take(BODY_PREFIX_LEN).collect(),
        });
    }

    let envelope: JsonRpcResponse = serde_json::from_str(body).map_err(|e| {
        let prefix: String = body.chars().take(200).collect();
        tracing::error!("JSON decode error: {}, Response: {}", e, prefix);
        RpcError::DecodeError(e.to_string())
    })?;

    if let Some(error) = envelope.error {
        return Err(RpcError::NodeError {
            code: error.code,
            message: error.message,
        });
    }

    match envelope.result {
        Some(Value::Null) | None => Err(RpcError::MissingResult),
        Some(result) => Ok(result),
    }
}
