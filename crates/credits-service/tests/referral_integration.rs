//! 邀请关系绑定集成测试

mod common;

use credits_service::error::CreditsError;
use credits_service::models::UserLevel;
use credits_service::service::ReferralService;

use common::*;

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_bind_to_top_tier_promotes_to_b() {
    let pool = setup_pool().await;
    let parent = seed_user(&pool, 0, UserLevel::A, None).await;
    let user = seed_user(&pool, 0, UserLevel::C, None).await;

    let level = ReferralService::new(pool.clone())
        .bind_parent(user, parent)
        .await
        .unwrap();

    assert_eq!(level, UserLevel::B);
    assert_eq!(get_level(&pool, user).await, UserLevel::B);

    cleanup_users(&pool, &[user, parent]).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_parent_bound_only_once() {
    let pool = setup_pool().await;
    let first = seed_user(&pool, 0, UserLevel::C, None).await;
    let second = seed_user(&pool, 0, UserLevel::B, None).await;
    let user = seed_user(&pool, 0, UserLevel::C, None).await;
    let service = ReferralService::new(pool.clone());

    service.bind_parent(user, first).await.unwrap();
    let err = service.bind_parent(user, second).await.unwrap_err();
    assert!(matches!(err, CreditsError::ParentAlreadyBound(_)));

    let parent_id: Option<i64> = sqlx::query_scalar("SELECT parent_id FROM users WHERE id = $1")
        .bind(user)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(parent_id, Some(first));

    cleanup_users(&pool, &[user, first, second]).await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_binding_rules_rejected() {
    let pool = setup_pool().await;
    let older = seed_user(&pool, 0, UserLevel::B, None).await;
    let top = seed_user(&pool, 0, UserLevel::A, None).await;
    let newer = seed_user(&pool, 0, UserLevel::C, None).await;
    let service = ReferralService::new(pool.clone());

    let err = service.bind_parent(top, older).await.unwrap_err();
    assert!(matches!(err, CreditsError::TopTierCannotBind(_)));

    // 只能绑定更早注册的用户，邀请链不会成环
    let err = service.bind_parent(older, newer).await.unwrap_err();
    assert!(matches!(err, CreditsError::InvalidParent(_)));

    let err = service.bind_parent(newer, newer).await.unwrap_err();
    assert!(matches!(err, CreditsError::InvalidParent(_)));

    let err = service.bind_parent(newer, i64::MAX).await.unwrap_err();
    assert!(matches!(err, CreditsError::InvalidParent(_)));

    cleanup_users(&pool, &[newer, top, older]).await;
}
