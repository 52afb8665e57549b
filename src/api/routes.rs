use actix_web::web;
use std::sync::Arc;

use super::handlers;
use super::middleware::ApiTokenAuth;

pub fn configure_routes(cfg: &mut web::ServiceConfig, api_token: Arc<str>) {
    cfg.service(
        web::scope("/api/v1")
            // Public routes
            .route("/health", web::get().to(health_check))
            // Protected routes
            .service(
                web::scope("")
                    .wrap(ApiTokenAuth { token: api_token })
                    .route("/commands", web::post().to(handlers::handle_command)),
            ),
    );
}

async fn health_check() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
