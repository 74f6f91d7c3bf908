//! PostgreSQL 连接池
//!
//! 服务进程和集成测试共用同一套建池与迁移逻辑。

use crate::config::DatabaseConfig;
use crate::error::{Result, SharedError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// 数据库连接池包装
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(
            min_connections = config.min_connections,
            "Database pool ready"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// 等待在途查询结束后关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }

    /// 执行工作区根目录 migrations/ 下的脚本，已执行过的会跳过
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SharedError::Internal(format!("migration failed: {}", e)))?;
        info!("Migrations applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::test_database_config;

    #[tokio::test]
    #[ignore = "需要 PostgreSQL"]
    async fn test_connect_and_migrate() {
        let db = Database::connect(&test_database_config()).await.unwrap();
        db.health_check().await.unwrap();
        db.run_migrations().await.unwrap();
        // 重复执行不报错
        db.run_migrations().await.unwrap();
    }
}
