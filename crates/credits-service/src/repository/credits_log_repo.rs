//! 积分流水仓储
//!
//! 流水只追加，(app_id, order_id) 唯一约束是幂等的最终保障

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::traits::CreditsLogRepositoryTrait;
use crate::error::Result;
use crate::models::{CreditChange, CreditsLog};

pub struct CreditsLogRepository {
    pool: PgPool,
}

impl CreditsLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 写入流水
    ///
    /// 幂等键已存在时返回 None，不会报唯一约束错误
    pub async fn insert_in_tx(tx: &mut PgConnection, change: &CreditChange) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO credits_logs (order_id, user_id, value, operation, channel, app_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (app_id, order_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&change.order_id)
        .bind(change.user_id)
        .bind(change.value)
        .bind(change.operation)
        .bind(&change.channel)
        .bind(change.app_id)
        .fetch_optional(tx)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl CreditsLogRepositoryTrait for CreditsLogRepository {
    async fn find_by_order(&self, app_id: i64, order_id: &str) -> Result<Option<CreditsLog>> {
        let log = sqlx::query_as::<_, CreditsLog>(
            r#"
            SELECT id, order_id, user_id, value, operation, channel, app_id, created_at
            FROM credits_logs WHERE app_id = $1 AND order_id = $2
            "#,
        )
        .bind(app_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(log)
    }

    async fn list_by_user_and_app(
        &self,
        user_id: i64,
        app_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditsLog>> {
        let logs = sqlx::query_as::<_, CreditsLog>(
            r#"
            SELECT id, order_id, user_id, value, operation, channel, app_id, created_at
            FROM credits_logs
            WHERE user_id = $1 AND app_id = $2
            ORDER BY id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(app_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn count_by_user_and_app(&self, user_id: i64, app_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM credits_logs WHERE user_id = $1 AND app_id = $2")
                .bind(user_id)
                .bind(app_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn sum_earned(&self, user_id: i64) -> Result<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(value), 0)::BIGINT FROM credits_logs
            WHERE user_id = $1 AND operation = 1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }
}
