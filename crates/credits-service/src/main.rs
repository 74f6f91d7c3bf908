//! 积分服务后台进程
//!
//! 运行等级晋升和返利的定时任务，指标通过独立端口暴露。

use std::sync::Arc;

use credits_service::{
    AppRepository, AppService, JobRunner, JobScheduler, LockConfig, LockManager, RebateService,
    SnowflakeGenerator, TierService,
};
use credits_shared::{cache::Cache, config::AppConfig, database::Database, observability};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("credits-service")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(environment = %config.environment, "Starting credits-service");

    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;
    let cache = Arc::new(Cache::new(&config.redis)?);

    // Redis 不可用时任务锁退回数据库
    let redis_client = match cache.health_check().await {
        Ok(()) => Some(cache.client().clone()),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, job locks fall back to database");
            None
        }
    };

    let id_gen = Arc::new(SnowflakeGenerator::new(
        config.snowflake.datacenter_id,
        config.snowflake.worker_id,
    )?);

    let app_service = AppService::new(Arc::new(AppRepository::new(db.pool().clone())));
    let mall_app = app_service
        .load_internal_app(&config.ledger.mall_app_id)
        .await?;
    info!(app_id = %mall_app.app_id, "Mall app loaded");

    let tier = Arc::new(TierService::new(
        db.pool().clone(),
        config.ledger.tier_b_credits_threshold,
    ));
    let rebate = Arc::new(RebateService::new(
        db.pool().clone(),
        id_gen,
        mall_app,
        config.ledger.credits_per_yuan,
    ));
    let lock_manager = Arc::new(LockManager::new(
        redis_client,
        db.pool().clone(),
        LockConfig::from_jobs(&config.jobs, cache.key_prefix()),
    ));
    let runner = Arc::new(JobRunner::new(lock_manager, tier, rebate));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_handle = if config.jobs.enabled {
        let scheduler = JobScheduler::from_config(runner, &config.jobs);
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        info!("Background jobs disabled");
        None
    };

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }

    db.close().await;
    info!("credits-service shutdown complete");

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
