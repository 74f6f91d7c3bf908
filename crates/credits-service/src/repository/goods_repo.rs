//! 商品仓储

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::traits::GoodsRepositoryTrait;
use crate::error::Result;
use crate::models::Goods;

const GOODS_COLUMNS: &str = r#"
    id, name, image, description, price, discount_price, enable_discount,
    discount_start, discount_end, inventory, inventory_total, status,
    enable_sale_time_range, sale_time_start, sale_time_end, created_at
"#;

pub struct GoodsRepository {
    pool: PgPool,
}

impl GoodsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id_in_tx(tx: &mut PgConnection, id: i64) -> Result<Option<Goods>> {
        let sql = format!("SELECT {GOODS_COLUMNS} FROM goods WHERE id = $1");
        let goods = sqlx::query_as::<_, Goods>(&sql)
            .bind(id)
            .fetch_optional(tx)
            .await?;
        Ok(goods)
    }

    /// 原子扣减库存，返回扣减后的库存
    ///
    /// 结果可能为负，由调用方判断并回滚事务
    pub async fn debit_inventory_in_tx(
        tx: &mut PgConnection,
        id: i64,
        quantity: i64,
    ) -> Result<Option<i64>> {
        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE goods SET inventory = inventory - $2 WHERE id = $1 RETURNING inventory",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(tx)
        .await?;
        Ok(remaining)
    }
}

#[async_trait]
impl GoodsRepositoryTrait for GoodsRepository {
    async fn list_on_shelf(&self, limit: i64, offset: i64) -> Result<Vec<Goods>> {
        let sql = format!(
            "SELECT {GOODS_COLUMNS} FROM goods WHERE status = TRUE ORDER BY id DESC LIMIT $1 OFFSET $2"
        );
        let goods = sqlx::query_as::<_, Goods>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(goods)
    }

    async fn count_on_shelf(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM goods WHERE status = TRUE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
