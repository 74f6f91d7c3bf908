//! 用户仓储
//!
//! 余额只通过 `add_credits_in_tx` 原子增减，不做读改写

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::traits::UserRepositoryTrait;
use crate::error::Result;
use crate::models::{ShippingInfo, User, UserLevel};

const USER_COLUMNS: &str = r#"
    id, phone, credits, level, parent_id,
    express_name, express_phone, express_area, express_address, created_at
"#;

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按手机号查找用户，不存在则创建
    ///
    /// 并发创建同一手机号时依赖唯一约束收敛到同一行
    pub async fn get_or_create_by_phone_in_tx(tx: &mut PgConnection, phone: &str) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (phone) VALUES ($1)
            ON CONFLICT (phone) DO UPDATE SET phone = EXCLUDED.phone
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(phone)
            .fetch_one(tx)
            .await?;
        Ok(user)
    }

    /// 读取并锁定用户行，锁持续到事务结束
    pub async fn lock_by_id_in_tx(tx: &mut PgConnection, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(tx)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id_in_tx(tx: &mut PgConnection, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(tx)
            .await?;
        Ok(user)
    }

    /// 原子增减余额，返回变动后的余额
    pub async fn add_credits_in_tx(tx: &mut PgConnection, id: i64, delta: i64) -> Result<i64> {
        let balance: i64 = sqlx::query_scalar(
            "UPDATE users SET credits = credits + $2 WHERE id = $1 RETURNING credits",
        )
        .bind(id)
        .bind(delta)
        .fetch_one(tx)
        .await?;
        Ok(balance)
    }

    /// 绑定邀请人，并在同一条语句中设置等级
    pub async fn bind_parent_in_tx(
        tx: &mut PgConnection,
        id: i64,
        parent_id: i64,
        level: UserLevel,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET parent_id = $2, level = $3 WHERE id = $1 AND parent_id IS NULL",
        )
        .bind(id)
        .bind(parent_id)
        .bind(level)
        .execute(tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 持有金卡藏品的用户晋升为 A
    pub async fn promote_gold_holders_in_tx(tx: &mut PgConnection) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users u SET level = 'A'
            WHERE u.level <> 'A'
              AND EXISTS (
                  SELECT 1 FROM user_treasures ut
                  JOIN treasure_infos ti ON ti.commodity_uuid = ut.commodity_uuid
                  WHERE ut.user_id = u.id AND ti.is_gold
              )
            "#,
        )
        .execute(tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// 上级为 A 的 C 级用户晋升为 B
    pub async fn promote_children_of_top_tier_in_tx(tx: &mut PgConnection) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users u SET level = 'B'
            FROM users p
            WHERE u.parent_id = p.id AND u.level = 'C' AND p.level = 'A'
            "#,
        )
        .execute(tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// 累计获得积分达到阈值的 C 级用户晋升为 B
    pub async fn promote_by_earned_credits_in_tx(
        tx: &mut PgConnection,
        threshold: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users u SET level = 'B'
            WHERE u.level = 'C'
              AND (
                  SELECT COALESCE(SUM(cl.value), 0) FROM credits_logs cl
                  WHERE cl.user_id = u.id AND cl.operation = 1
              ) >= $1
            "#,
        )
        .bind(threshold)
        .execute(tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn top_by_credits(&self, limit: i64) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY credits DESC, id ASC LIMIT $1");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_shipping(&self, id: i64, shipping: &ShippingInfo) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                express_name = $2,
                express_phone = $3,
                express_area = $4,
                express_address = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&shipping.name)
        .bind(&shipping.phone)
        .bind(&shipping.area)
        .bind(&shipping.address)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
