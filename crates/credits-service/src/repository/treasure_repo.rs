//! 藏品仓储
//!
//! (commodity_uuid, number) 唯一，行锁用于串行化同一藏品的并发同步

use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::{PendingRebate, TreasureDiff, TreasureRecord, UserTreasure};

const TREASURE_COLUMNS: &str = r#"
    id, user_id, commodity_uuid, number, name, cover, type_market, is_rebate, created_at, updated_at
"#;

pub struct TreasureRepository;

impl TreasureRepository {
    /// 按 (commodity_uuid, number) 读取并加行锁
    pub async fn lock_by_key_in_tx(
        tx: &mut PgConnection,
        commodity_uuid: &str,
        number: i64,
    ) -> Result<Option<UserTreasure>> {
        let sql = format!(
            "SELECT {TREASURE_COLUMNS} FROM user_treasures WHERE commodity_uuid = $1 AND number = $2 FOR UPDATE"
        );
        let treasure = sqlx::query_as::<_, UserTreasure>(&sql)
            .bind(commodity_uuid)
            .bind(number)
            .fetch_optional(tx)
            .await?;
        Ok(treasure)
    }

    /// 插入新记录
    ///
    /// 与其他事务并发插入同一键时返回 None
    pub async fn insert_in_tx(
        tx: &mut PgConnection,
        user_id: i64,
        record: &TreasureRecord,
    ) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO user_treasures (user_id, commodity_uuid, number, name, cover, type_market)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (commodity_uuid, number) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&record.commodity_uuid)
        .bind(record.number)
        .bind(&record.name)
        .bind(&record.cover)
        .bind(record.type_market)
        .fetch_optional(tx)
        .await?;
        Ok(id)
    }

    /// 只更新有变化的字段
    pub async fn apply_diff_in_tx(tx: &mut PgConnection, id: i64, diff: &TreasureDiff) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_treasures SET
                name = COALESCE($2, name),
                cover = COALESCE($3, cover),
                type_market = COALESCE($4, type_market),
                user_id = COALESCE($5, user_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(diff.name.as_deref())
        .bind(diff.cover.as_deref())
        .bind(diff.type_market)
        .bind(diff.user_id)
        .execute(tx)
        .await?;
        Ok(())
    }

    /// id 大于 `after_id` 的未返利且有价格信息的藏品，按 id 升序
    pub async fn list_pending_rebates(
        pool: &PgPool,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<PendingRebate>> {
        let rows = sqlx::query_as::<_, PendingRebate>(
            r#"
            SELECT ut.id AS treasure_id, ut.user_id, ut.commodity_uuid, ut.number, ti.price
            FROM user_treasures ut
            JOIN treasure_infos ti ON ti.commodity_uuid = ut.commodity_uuid
            WHERE ut.is_rebate = FALSE AND ut.id > $1
            ORDER BY ut.id ASC
            LIMIT $2
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// 锁定待返利记录，已返利时返回 None
    pub async fn lock_pending_rebate_in_tx(tx: &mut PgConnection, id: i64) -> Result<Option<i64>> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "SELECT user_id FROM user_treasures WHERE id = $1 AND is_rebate = FALSE FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx)
        .await?;
        Ok(user_id)
    }

    pub async fn mark_rebated_in_tx(tx: &mut PgConnection, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE user_treasures SET is_rebate = TRUE, updated_at = NOW() WHERE id = $1 AND is_rebate = FALSE",
        )
        .bind(id)
        .execute(tx)
        .await?;
        Ok(())
    }
}
