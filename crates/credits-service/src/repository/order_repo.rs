//! 商城订单仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};

use super::traits::OrderRepositoryTrait;
use crate::error::Result;
use crate::models::{NewOrder, Order, OrderStatus};

const ORDER_COLUMNS: &str = r#"
    id, order_id, user_id, goods_id, unit_price, quantity, total_price, status,
    express_name, express_phone, express_area, express_address, created_at
"#;

/// 最新订单行（附带下单人手机号和商品名）
#[derive(Debug, Clone, FromRow)]
pub struct RecentOrderRow {
    pub phone: String,
    pub goods_name: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_in_tx(tx: &mut PgConnection, order: &NewOrder) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (order_id, user_id, goods_id, unit_price, quantity, total_price,
                                status, express_name, express_phone, express_area, express_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&order.order_id)
        .bind(order.user_id)
        .bind(order.goods_id)
        .bind(order.unit_price)
        .bind(order.quantity)
        .bind(order.total_price)
        .bind(OrderStatus::Pending)
        .bind(&order.shipping.name)
        .bind(&order.shipping.phone)
        .bind(&order.shipping.area)
        .bind(&order.shipping.address)
        .fetch_one(tx)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    async fn count_by_user(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<RecentOrderRow>> {
        let rows = sqlx::query_as::<_, RecentOrderRow>(
            r#"
            SELECT u.phone, g.name AS goods_name, o.quantity, o.created_at
            FROM orders o
            JOIN users u ON u.id = o.user_id
            JOIN goods g ON g.id = o.goods_id
            ORDER BY o.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_status(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE orders SET status = $3 WHERE order_id = $1 AND status = $2")
                .bind(order_id)
                .bind(from)
                .bind(to)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
