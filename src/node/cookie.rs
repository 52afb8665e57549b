use std::path::Path;

use crate::error::{AppError, AppResult};

/// Hosts whose RPC credentials may come from the local cookie file
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Reads `user:password` from the node's cookie file
pub fn read_cookie(path: &Path) -> AppResult<(String, String)> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::CookieUnavailable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    parse_cookie(&content).ok_or_else(|| AppError::CookieUnavailable {
        path: path.display().to_string(),
        reason: "expected user:password".to_string(),
    })
}

fn parse_cookie(content: &str) -> Option<(String, String)> {
    let (user, password) = content.trim().split_once(':')?;
    if user.is_empty() || password.is_empty() {
        return None;
    }
    Some((user.to_string(), password.to_string()))
}
