//! 集成测试公共辅助
//!
//! 每个测试用唯一手机号和商品标识造数，结束时按用户 id 清理。

#![allow(dead_code)]

use std::sync::Arc;

use credits_service::id_gen::SnowflakeGenerator;
use credits_service::lock::{LockConfig, LockManager};
use credits_service::models::{OpenApp, UserLevel};
use credits_shared::cache::Cache;
use credits_shared::database::Database;
use credits_shared::test_utils::{test_database_config, test_phone, test_redis_config};
use fake::Fake;
use fake::faker::company::en::CatchPhrase;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// 连接测试库并执行迁移
pub async fn setup_pool() -> PgPool {
    let db = Database::connect(&test_database_config())
        .await
        .expect("连接测试数据库失败");
    db.run_migrations().await.expect("执行迁移失败");
    db.pool().clone()
}

pub fn setup_cache() -> Arc<Cache> {
    Arc::new(Cache::new(&test_redis_config()).expect("Redis 配置无效"))
}

pub fn id_gen() -> Arc<SnowflakeGenerator> {
    Arc::new(SnowflakeGenerator::new(1, 1).expect("节点 id 合法"))
}

/// 只用数据库锁，避免依赖 Redis
pub fn db_lock_manager(pool: &PgPool) -> Arc<LockManager> {
    Arc::new(LockManager::new(None, pool.clone(), LockConfig::default()))
}

pub async fn mall_app(pool: &PgPool) -> OpenApp {
    sqlx::query_as::<_, OpenApp>(
        "SELECT id, name, app_id, app_secret, created_at FROM open_apps WHERE app_id = 'mall'",
    )
    .fetch_one(pool)
    .await
    .expect("迁移应内置 mall 应用")
}

/// 插入一个独立的测试应用
pub async fn seed_app(pool: &PgPool, app_id: &str, secret: &str) -> OpenApp {
    sqlx::query_as::<_, OpenApp>(
        r#"
        INSERT INTO open_apps (name, app_id, app_secret)
        VALUES ($1, $1, $2)
        RETURNING id, name, app_id, app_secret, created_at
        "#,
    )
    .bind(app_id)
    .bind(secret)
    .fetch_one(pool)
    .await
    .expect("插入测试应用失败")
}

/// 插入测试用户，返回用户 id
pub async fn seed_user(pool: &PgPool, credits: i64, level: UserLevel, parent_id: Option<i64>) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO users (phone, credits, level, parent_id,
                           express_name, express_phone, express_area, express_address)
        VALUES ($1, $2, $3, $4, '张三', '13800001111', '上海市浦东新区', '世纪大道 1 号')
        RETURNING id
        "#,
    )
    .bind(test_phone())
    .bind(credits)
    .bind(level.as_str())
    .bind(parent_id)
    .fetch_one(pool)
    .await
    .expect("插入测试用户失败")
}

/// 插入在售商品，返回商品 id
pub async fn seed_goods(pool: &PgPool, price: i64, inventory: i64) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO goods (name, price, inventory, inventory_total, status)
        VALUES ($1, $2, $3, $3, TRUE)
        RETURNING id
        "#,
    )
    .bind(CatchPhrase().fake::<String>())
    .bind(price)
    .bind(inventory)
    .fetch_one(pool)
    .await
    .expect("插入测试商品失败")
}

/// 插入藏品价格信息
pub async fn seed_treasure_info(pool: &PgPool, commodity_uuid: &str, price: Decimal, is_gold: bool) {
    sqlx::query(
        r#"
        INSERT INTO treasure_infos (commodity_uuid, name, is_gold, price)
        VALUES ($1, '测试藏品', $2, $3)
        ON CONFLICT (commodity_uuid) DO UPDATE SET is_gold = EXCLUDED.is_gold, price = EXCLUDED.price
        "#,
    )
    .bind(commodity_uuid)
    .bind(is_gold)
    .bind(price)
    .execute(pool)
    .await
    .expect("插入藏品信息失败");
}

/// 直接插入一条持有记录，返回记录 id
pub async fn seed_user_treasure(pool: &PgPool, user_id: i64, commodity_uuid: &str, number: i64) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO user_treasures (user_id, commodity_uuid, number, name)
        VALUES ($1, $2, $3, '测试藏品')
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(commodity_uuid)
    .bind(number)
    .fetch_one(pool)
    .await
    .expect("插入持有记录失败")
}

pub async fn get_credits(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("查询余额失败")
}

pub async fn get_level(pool: &PgPool, user_id: i64) -> UserLevel {
    sqlx::query_scalar("SELECT level FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("查询等级失败")
}

pub async fn get_inventory(pool: &PgPool, goods_id: i64) -> i64 {
    sqlx::query_scalar("SELECT inventory FROM goods WHERE id = $1")
        .bind(goods_id)
        .fetch_one(pool)
        .await
        .expect("查询库存失败")
}

pub async fn count_logs(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM credits_logs WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("查询流水失败")
}

pub async fn count_orders(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("查询订单失败")
}

/// 清理用户及其关联数据
///
/// 子用户需排在上级之前
pub async fn cleanup_users(pool: &PgPool, user_ids: &[i64]) {
    for table in ["credits_logs", "orders", "user_treasures"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE user_id = ANY($1)"))
            .bind(user_ids)
            .execute(pool)
            .await
            .ok();
    }
    sqlx::query("UPDATE users SET parent_id = NULL WHERE id = ANY($1)")
        .bind(user_ids)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM users WHERE id = ANY($1)")
        .bind(user_ids)
        .execute(pool)
        .await
        .ok();
}

pub async fn cleanup_goods(pool: &PgPool, goods_id: i64) {
    sqlx::query("DELETE FROM orders WHERE goods_id = $1")
        .bind(goods_id)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM goods WHERE id = $1")
        .bind(goods_id)
        .execute(pool)
        .await
        .ok();
}

pub async fn cleanup_treasure_info(pool: &PgPool, commodity_uuid: &str) {
    sqlx::query("DELETE FROM treasure_infos WHERE commodity_uuid = $1")
        .bind(commodity_uuid)
        .execute(pool)
        .await
        .ok();
}

pub async fn cleanup_app(pool: &PgPool, app: &OpenApp) {
    sqlx::query("DELETE FROM credits_logs WHERE app_id = $1")
        .bind(app.id)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM open_apps WHERE id = $1")
        .bind(app.id)
        .execute(pool)
        .await
        .ok();
}
