//! 等级晋升与返利任务集成测试
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p credits-service --test jobs_integration -- --ignored
//! ```

mod common;

use std::sync::Arc;

use credits_service::models::{CreditChange, CreditOperation, UserLevel};
use credits_service::service::{CHANNEL_REBATE, LedgerService, RebateService, TierService};
use credits_service::worker::{JobRunner, REBATE_JOB_LOCK};
use credits_shared::test_utils::{test_commodity_uuid, test_order_id};
use rust_decimal::Decimal;
use sqlx::PgPool;

use common::*;

const THRESHOLD: i64 = 100_000;

async fn rebate_service(pool: &PgPool) -> Arc<RebateService> {
    Arc::new(RebateService::new(
        pool.clone(),
        id_gen(),
        mall_app(pool).await,
        10_000,
    ))
}

async fn is_rebated(pool: &PgPool, treasure_id: i64) -> bool {
    sqlx::query_scalar("SELECT is_rebate FROM user_treasures WHERE id = $1")
        .bind(treasure_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn rebate_log_count(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM credits_logs WHERE user_id = $1 AND channel = $2")
        .bind(user_id)
        .bind(CHANNEL_REBATE)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_gold_holder_promoted_to_top_tier() {
    let pool = setup_pool().await;
    let holder = seed_user(&pool, 0, UserLevel::C, None).await;
    let commodity = test_commodity_uuid();
    seed_treasure_info(&pool, &commodity, Decimal::ZERO, true).await;
    seed_user_treasure(&pool, holder, &commodity, 1).await;

    let tier = TierService::new(pool.clone(), THRESHOLD);
    tier.run_promotions().await.unwrap();
    assert_eq!(get_level(&pool, holder).await, UserLevel::A);

    cleanup_users(&pool, &[holder]).await;
    cleanup_treasure_info(&pool, &commodity).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_children_and_earners_promoted_once() {
    let pool = setup_pool().await;
    let app = mall_app(&pool).await;
    let top = seed_user(&pool, 0, UserLevel::A, None).await;
    let child = seed_user(&pool, 0, UserLevel::C, Some(top)).await;
    let earner = seed_user(&pool, 0, UserLevel::C, None).await;
    let small_earner = seed_user(&pool, 0, UserLevel::C, None).await;

    let ledger = LedgerService::new(pool.clone());
    for (user_id, value) in [(earner, THRESHOLD), (small_earner, THRESHOLD - 1)] {
        ledger
            .apply_credit_change(&CreditChange::new(
                app.id,
                test_order_id("earn"),
                user_id,
                CreditOperation::Increase,
                value,
                "test",
            ))
            .await
            .unwrap();
    }
    // 扣减不影响累计获得
    ledger
        .apply_credit_change(&CreditChange::new(
            app.id,
            test_order_id("spend"),
            earner,
            CreditOperation::Decrease,
            THRESHOLD,
            "test",
        ))
        .await
        .unwrap();

    let tier = TierService::new(pool.clone(), THRESHOLD);
    tier.run_promotions().await.unwrap();

    assert_eq!(get_level(&pool, top).await, UserLevel::A);
    assert_eq!(get_level(&pool, child).await, UserLevel::B);
    assert_eq!(get_level(&pool, earner).await, UserLevel::B);
    assert_eq!(get_level(&pool, small_earner).await, UserLevel::C);

    // 重复执行结果不变
    tier.run_promotions().await.unwrap();
    assert_eq!(get_level(&pool, child).await, UserLevel::B);
    assert_eq!(get_level(&pool, earner).await, UserLevel::B);
    assert_eq!(get_level(&pool, small_earner).await, UserLevel::C);

    cleanup_users(&pool, &[child, top, earner, small_earner]).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_promotion_never_demotes() {
    let pool = setup_pool().await;
    // 没有任何晋升依据的 A 和 B
    let a = seed_user(&pool, 0, UserLevel::A, None).await;
    let b = seed_user(&pool, 0, UserLevel::B, None).await;

    TierService::new(pool.clone(), THRESHOLD)
        .run_promotions()
        .await
        .unwrap();

    assert_eq!(get_level(&pool, a).await, UserLevel::A);
    assert_eq!(get_level(&pool, b).await, UserLevel::B);

    cleanup_users(&pool, &[a, b]).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_rebate_pays_parent_and_grandparent_once() {
    let pool = setup_pool().await;
    let grandparent = seed_user(&pool, 0, UserLevel::A, None).await;
    let parent = seed_user(&pool, 0, UserLevel::B, Some(grandparent)).await;
    let owner = seed_user(&pool, 0, UserLevel::C, Some(parent)).await;

    let commodity = test_commodity_uuid();
    seed_treasure_info(&pool, &commodity, Decimal::from(100), false).await;
    let treasure_id = seed_user_treasure(&pool, owner, &commodity, 1).await;

    let service = rebate_service(&pool).await;
    service.run_rebates().await.unwrap();

    assert_eq!(get_credits(&pool, parent).await, 300_000);
    assert_eq!(get_credits(&pool, grandparent).await, 100_000);
    assert_eq!(get_credits(&pool, owner).await, 0);
    assert!(is_rebated(&pool, treasure_id).await);

    // 再跑一轮不会重复发放
    service.run_rebates().await.unwrap();
    assert_eq!(get_credits(&pool, parent).await, 300_000);
    assert_eq!(get_credits(&pool, grandparent).await, 100_000);
    assert_eq!(rebate_log_count(&pool, parent).await, 1);
    assert_eq!(rebate_log_count(&pool, grandparent).await, 1);

    cleanup_users(&pool, &[owner, parent, grandparent]).await;
    cleanup_treasure_info(&pool, &commodity).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_rebate_without_parent_marks_record() {
    let pool = setup_pool().await;
    let owner = seed_user(&pool, 0, UserLevel::C, None).await;
    let commodity = test_commodity_uuid();
    seed_treasure_info(&pool, &commodity, Decimal::from(50), false).await;
    let treasure_id = seed_user_treasure(&pool, owner, &commodity, 7).await;

    rebate_service(&pool).await.run_rebates().await.unwrap();

    assert!(is_rebated(&pool, treasure_id).await);
    assert_eq!(count_logs(&pool, owner).await, 0);

    cleanup_users(&pool, &[owner]).await;
    cleanup_treasure_info(&pool, &commodity).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_concurrent_rebate_runs_pay_once() {
    let pool = setup_pool().await;
    let parent = seed_user(&pool, 0, UserLevel::C, None).await;
    let owner = seed_user(&pool, 0, UserLevel::C, Some(parent)).await;
    let commodity = test_commodity_uuid();
    seed_treasure_info(&pool, &commodity, Decimal::from(10), false).await;
    for number in 1..=5 {
        seed_user_treasure(&pool, owner, &commodity, number).await;
    }

    // 不经过任务锁，直接并发执行，依赖记录级行锁
    let service = rebate_service(&pool).await;
    let (a, b) = tokio::join!(service.run_rebates(), service.run_rebates());
    a.unwrap();
    b.unwrap();

    // 每条 10 元 * 10000 * 10%
    assert_eq!(get_credits(&pool, parent).await, 5 * 10_000);
    assert_eq!(rebate_log_count(&pool, parent).await, 5);

    cleanup_users(&pool, &[owner, parent]).await;
    cleanup_treasure_info(&pool, &commodity).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_job_skipped_while_lock_held() {
    let pool = setup_pool().await;
    let lock_manager = db_lock_manager(&pool);
    let runner = JobRunner::new(
        lock_manager.clone(),
        Arc::new(TierService::new(pool.clone(), THRESHOLD)),
        rebate_service(&pool).await,
    );

    let guard = lock_manager
        .try_acquire(REBATE_JOB_LOCK)
        .await
        .unwrap()
        .expect("锁应空闲");

    assert!(runner.run_rebates().await.is_none());

    guard.release().await.unwrap();
    assert!(runner.run_rebates().await.is_some());
}
