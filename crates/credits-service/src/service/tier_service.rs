//! 用户等级晋升
//!
//! 三条规则按固定顺序执行，均为集合更新：
//!
//! 1. 持有金卡藏品的用户 -> A
//! 2. 上级为 A 的 C 级用户 -> B
//! 3. 累计获得积分达到阈值的 C 级用户 -> B
//!
//! 规则只晋升不降级，重复执行结果不变。

use sqlx::PgPool;
use tracing::{info, instrument};

use credits_shared::observability::metrics;

use crate::error::Result;
use crate::repository::UserRepository;

/// 单次晋升的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierReport {
    pub gold_holders: u64,
    pub children_of_top_tier: u64,
    pub earned_credits: u64,
}

impl TierReport {
    pub fn total(&self) -> u64 {
        self.gold_holders + self.children_of_top_tier + self.earned_credits
    }
}

pub struct TierService {
    pool: PgPool,
    /// 规则 3 的阈值
    credits_threshold: i64,
}

impl TierService {
    pub fn new(pool: PgPool, credits_threshold: i64) -> Self {
        Self {
            pool,
            credits_threshold,
        }
    }

    /// 执行一轮等级晋升
    ///
    /// 调用方需持有 `do_update_user_level` 任务锁
    #[instrument(skip(self), fields(threshold = self.credits_threshold))]
    pub async fn run_promotions(&self) -> Result<TierReport> {
        let mut tx = self.pool.begin().await?;

        let report = TierReport {
            gold_holders: UserRepository::promote_gold_holders_in_tx(&mut tx).await?,
            children_of_top_tier: UserRepository::promote_children_of_top_tier_in_tx(&mut tx)
                .await?,
            earned_credits: UserRepository::promote_by_earned_credits_in_tx(
                &mut tx,
                self.credits_threshold,
            )
            .await?,
        };

        tx.commit().await?;

        metrics::record_tier_promotions("gold_holder", report.gold_holders);
        metrics::record_tier_promotions("child_of_top_tier", report.children_of_top_tier);
        metrics::record_tier_promotions("earned_credits", report.earned_credits);

        info!(
            gold_holders = report.gold_holders,
            children_of_top_tier = report.children_of_top_tier,
            earned_credits = report.earned_credits,
            "Tier promotion finished"
        );

        Ok(report)
    }
}
