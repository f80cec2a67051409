//! 约束引擎守护进程
//!
//! 连接 PostgreSQL 与 Redis，启动缓存同步 worker，收到
//! Ctrl+C 或 SIGTERM 后优雅停止。

use anyhow::Result;
use constraint_engine::store::{ConstraintStore, PgDocumentStore};
use constraint_engine::sync::CacheSyncWorker;
use freight_shared::cache::Cache;
use freight_shared::config::AppConfig;
use freight_shared::database::Database;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("constraint-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    init_tracing(&config);
    info!(environment = %config.environment, "Starting constraint-engine service...");

    let database = Database::connect(&config.database).await?;
    database.health_check().await?;
    info!("Database connected");

    let cache = Cache::new(&config.redis)?;
    cache.health_check().await?;
    info!("Redis connected");

    let store = ConstraintStore::new(Arc::new(PgDocumentStore::new(database.pool().clone())));
    let worker = CacheSyncWorker::new(store, Arc::new(cache), &config.sync);
    let sync_handle = worker.start();

    shutdown_signal().await;

    sync_handle.stop().await;
    database.close().await;
    info!("Service shutdown complete");
    Ok(())
}

/// 按配置初始化日志订阅器
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));

    if config.observability.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
