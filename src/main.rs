mod api;
mod config;
mod crypto;
mod error;
mod node;
mod services;
mod store;

use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{AppConfig, StorageBackend};
use crypto::CredentialCipher;
use node::{NodeRpc, RpcClient};
use services::{CommandService, NodeService, TransferService};
use store::{CredentialStore, MemoryCredentialStore, SqlCredentialStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging with console and file output
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".into());
    std::fs::create_dir_all(&log_dir)?;

    // File appender - rotates when > 100MB, keeps 5 backup files
    let log_path = std::path::Path::new(&log_dir).join("juno-node-bot.log");
    let file_appender = rolling_file::RollingFileAppender::new(
        log_path,
        rolling_file::RollingConditionBasic::new().max_size(100 * 1024 * 1024),
        5,
    )?;

    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sqlx=warn".into()),
    );

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    tracing::info!("Starting Juno Node Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().map_err(|e| to_io_error(e.into()))?;
    tracing::info!("Configuration loaded successfully");

    let store: Arc<dyn CredentialStore> = match config.storage.backend {
        StorageBackend::Mysql => {
            tracing::info!(
                "Database: {}:{}/{}",
                config.database.host,
                config.database.port,
                config.database.name
            );
            let pool = store::mysql::create_pool(&config.database)
                .await
                .map_err(to_io_error)?;
            store::mysql::run_migrations(&pool).await.map_err(to_io_error)?;
            let cipher = CredentialCipher::new(&config.security.encryption_key).map_err(to_io_error)?;
            Arc::new(SqlCredentialStore::new(pool, cipher))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; node credentials are lost on restart");
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let rpc: Arc<dyn NodeRpc> = Arc::new(RpcClient::new(&config.node).map_err(|e| {
        tracing::error!("Failed to create node RPC client: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?);

    // Flipped on ctrl-c so in-flight operation polling stops waiting
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let nodes = NodeService::new(rpc.clone(), store, &config.node);
    let transfers = TransferService::new(rpc, &config.transfer, shutdown_rx);
    let command_service = Arc::new(CommandService::new(nodes, transfers));

    let api_token: Arc<str> = Arc::from(config.security.api_token.as_str());
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    tracing::info!("Starting HTTP server at {}:{}", server_host, server_port);

    HttpServer::new(move || {
        let api_token = api_token.clone();
        App::new()
            .wrap(actix_web::middleware::from_fn(api::middleware::request_logger))
            .app_data(web::Data::new(command_service.clone()))
            .configure(|cfg| api::configure_routes(cfg, api_token))
    })
    .bind((server_host, server_port))?
    .run()
    .await
}

fn to_io_error(err: error::AppError) -> std::io::Error {
    tracing::error!("Startup failed: {}", err);
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}
