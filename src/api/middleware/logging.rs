use actix_web::middleware::Next;
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    Error,
};
use std::time::Instant;

const HEALTH_PATH: &str = "/api/v1/health";

/// Logs each request and its status. Health probes are logged at debug.
pub async fn request_logger(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.path().to_string();
    let peer = req
        .connection_info()
        .realip_remote_addr()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let quiet = path == HEALTH_PATH;

    if quiet {
        tracing::debug!("--> {} {} (from: {})", method, path, peer);
    } else {
        tracing::info!("--> {} {} (from: {})", method, path, peer);
    }

    let res = next.call(req).await?;

    let elapsed = start.elapsed().as_millis();
    let status = res.status().as_u16();

    if status >= 400 {
        tracing::warn!("<-- {} {} {} ({}ms)", method, path, status, elapsed);
    } else if quiet {
        tracing::debug!("<-- {} {} {} ({}ms)", method, path, status, elapsed);
    } else {
        tracing::info!("<-- {} {} {} ({}ms)", method, path, status, elapsed);
    }

    Ok(res)
}
