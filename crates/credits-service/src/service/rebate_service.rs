//! 藏品购买返利
//!
//! 下级用户持有带价格的藏品后，按上级链路发放积分返利：
//!
//! | 持有人 | 上级 | 比例 | 发放给 |
//! |---|---|---|---|
//! | B | A | 50% | 上级 |
//! | C | B | 30% | 上级 |
//! | C | C | 10% | 上级 |
//! | C（上级 B，上上级 A） | - | 额外 10% | 上上级 |
//!
//! 返利基数为 `价格 * credits_per_yuan`，结果向零取整。
//! 每条藏品记录的所有返利与返利标记在同一事务内提交，
//! 单条失败只记录日志，不影响同批次其他记录，下一轮会重新处理。

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument, warn};

use credits_shared::observability::metrics;

use crate::error::{CreditsError, Result};
use crate::id_gen::SnowflakeGenerator;
use crate::models::{CreditChange, CreditOperation, OpenApp, PendingRebate, UserLevel};
use crate::repository::{TreasureRepository, UserRepository};
use crate::service::ledger_service::LedgerService;

/// 返利流水的渠道
pub const CHANNEL_REBATE: &str = "rebate";

/// 单轮最多处理的记录数
const BATCH_SIZE: i64 = 500;

/// 返利对象与持有人的关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebateRelation {
    Parent,
    Grandparent,
}

impl RebateRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Grandparent => "grandparent",
        }
    }
}

/// 邀请链上的一个用户
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainMember {
    pub id: i64,
    pub level: UserLevel,
}

/// 一笔待发放的返利
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebatePayout {
    pub user_id: i64,
    pub relation: RebateRelation,
    pub credits: i64,
}

/// 计算返利基数
pub fn credits_total(price: Decimal, credits_per_yuan: i64) -> Decimal {
    price * Decimal::from(credits_per_yuan)
}

/// 按返利表计算应发放的返利
///
/// 最多一笔上级返利和一笔上上级返利；金额为 0 的不发放
pub fn plan_rebate(
    owner_level: UserLevel,
    parent: Option<ChainMember>,
    grandparent: Option<ChainMember>,
    credits_total: Decimal,
) -> Vec<RebatePayout> {
    let Some(parent) = parent else {
        return Vec::new();
    };

    let mut payouts = Vec::with_capacity(2);

    let parent_rate = match (owner_level, parent.level) {
        (UserLevel::B, UserLevel::A) => Some(Decimal::new(5, 1)),
        (UserLevel::C, UserLevel::B) => Some(Decimal::new(3, 1)),
        (UserLevel::C, UserLevel::C) => Some(Decimal::new(1, 1)),
        _ => None,
    };
    if let Some(credits) = parent_rate.and_then(|rate| payout_amount(credits_total, rate)) {
        payouts.push(RebatePayout {
            user_id: parent.id,
            relation: RebateRelation::Parent,
            credits,
        });
    }

    let grandparent_eligible = owner_level == UserLevel::C
        && parent.level == UserLevel::B
        && grandparent.is_some_and(|g| g.level == UserLevel::A);
    if let (true, Some(grandparent)) = (grandparent_eligible, grandparent) {
        if let Some(credits) = payout_amount(credits_total, Decimal::new(1, 1)) {
            payouts.push(RebatePayout {
                user_id: grandparent.id,
                relation: RebateRelation::Grandparent,
                credits,
            });
        }
    }

    payouts
}

fn payout_amount(credits_total: Decimal, rate: Decimal) -> Option<i64> {
    (credits_total * rate)
        .trunc()
        .to_i64()
        .filter(|credits| *credits > 0)
}

/// 单轮返利统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebateReport {
    /// 已处理并标记的记录
    pub processed: u64,
    /// 实际发放的返利笔数
    pub payouts: u64,
    /// 处理失败、留待下轮的记录
    pub failed: u64,
}

pub struct RebateService {
    pool: PgPool,
    id_gen: Arc<SnowflakeGenerator>,
    /// 返利流水记在商城应用名下
    mall_app: OpenApp,
    credits_per_yuan: i64,
}

impl RebateService {
    pub fn new(
        pool: PgPool,
        id_gen: Arc<SnowflakeGenerator>,
        mall_app: OpenApp,
        credits_per_yuan: i64,
    ) -> Self {
        Self {
            pool,
            id_gen,
            mall_app,
            credits_per_yuan,
        }
    }

    /// 处理所有未返利的藏品记录
    ///
    /// 调用方需持有 `do_rebate` 任务锁
    #[instrument(skip(self))]
    pub async fn run_rebates(&self) -> Result<RebateReport> {
        let mut report = RebateReport::default();
        // 失败的记录保持未返利状态，按 id 游标前进，本轮不再重试
        let mut cursor = 0;

        loop {
            let batch =
                TreasureRepository::list_pending_rebates(&self.pool, cursor, BATCH_SIZE).await?;

            for item in &batch {
                cursor = item.treasure_id;
                match self.rebate_one(item).await {
                    Ok(paid) => {
                        report.processed += 1;
                        report.payouts += paid;
                    }
                    Err(e) => {
                        warn!(
                            treasure_id = item.treasure_id,
                            user_id = item.user_id,
                            error = %e,
                            "Rebate failed, will retry next run"
                        );
                        report.failed += 1;
                    }
                }
            }

            if (batch.len() as i64) < BATCH_SIZE {
                break;
            }
        }

        info!(
            processed = report.processed,
            payouts = report.payouts,
            failed = report.failed,
            "Rebate run finished"
        );
        Ok(report)
    }

    /// 处理单条记录，返回发放的返利笔数
    async fn rebate_one(&self, item: &PendingRebate) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        // 其他实例已处理
        let Some(owner_id) =
            TreasureRepository::lock_pending_rebate_in_tx(&mut tx, item.treasure_id).await?
        else {
            return Ok(0);
        };

        let owner = load_member(&mut tx, owner_id)
            .await?
            .ok_or_else(|| CreditsError::UserNotFound(owner_id.to_string()))?;
        let parent = match owner.1 {
            Some(parent_id) => load_member(&mut tx, parent_id).await?,
            None => None,
        };
        let grandparent = match parent.and_then(|(_, grandparent_id)| grandparent_id) {
            Some(grandparent_id) => load_member(&mut tx, grandparent_id).await?,
            None => None,
        };

        let total = credits_total(item.price, self.credits_per_yuan);
        let payouts = plan_rebate(
            owner.0.level,
            parent.map(|(member, _)| member),
            grandparent.map(|(member, _)| member),
            total,
        );

        for payout in &payouts {
            let change = CreditChange::new(
                self.mall_app.id,
                self.id_gen.next_order_id()?,
                payout.user_id,
                CreditOperation::Increase,
                payout.credits,
                CHANNEL_REBATE,
            );
            LedgerService::apply_in_tx(&mut tx, &change).await?;
            debug!(
                treasure_id = item.treasure_id,
                to_user = payout.user_id,
                relation = payout.relation.as_str(),
                credits = payout.credits,
                "Rebate paid"
            );
        }

        TreasureRepository::mark_rebated_in_tx(&mut tx, item.treasure_id).await?;
        tx.commit().await?;

        for payout in &payouts {
            metrics::record_rebate_payout(payout.relation.as_str(), payout.credits);
        }

        Ok(payouts.len() as u64)
    }
}

/// 读取用户等级和上级 id
async fn load_member(
    tx: &mut PgConnection,
    user_id: i64,
) -> Result<Option<(ChainMember, Option<i64>)>> {
    Ok(UserRepository::find_by_id_in_tx(tx, user_id)
        .await?
        .map(|user| {
            (
                ChainMember {
                    id: user.id,
                    level: user.level,
                },
                user.parent_id,
            )
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: i64, level: UserLevel) -> ChainMember {
        ChainMember { id, level }
    }

    fn total_for_price(price: i64) -> Decimal {
        credits_total(Decimal::from(price), 10_000)
    }

    #[test]
    fn test_c_owner_with_b_parent_and_a_grandparent() {
        let payouts = plan_rebate(
            UserLevel::C,
            Some(member(2, UserLevel::B)),
            Some(member(1, UserLevel::A)),
            total_for_price(100),
        );

        assert_eq!(
            payouts,
            vec![
                RebatePayout {
                    user_id: 2,
                    relation: RebateRelation::Parent,
                    credits: 300_000
                },
                RebatePayout {
                    user_id: 1,
                    relation: RebateRelation::Grandparent,
                    credits: 100_000
                },
            ]
        );
    }

    #[test]
    fn test_b_owner_with_a_parent() {
        let payouts = plan_rebate(
            UserLevel::B,
            Some(member(1, UserLevel::A)),
            None,
            total_for_price(100),
        );
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].credits, 500_000);
        assert_eq!(payouts[0].relation, RebateRelation::Parent);
    }

    #[test]
    fn test_c_owner_with_c_parent() {
        let payouts = plan_rebate(
            UserLevel::C,
            Some(member(3, UserLevel::C)),
            Some(member(1, UserLevel::A)),
            total_for_price(100),
        );
        // 上级为 C 时上上级不参与
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].user_id, 3);
        assert_eq!(payouts[0].credits, 100_000);
    }

    #[test]
    fn test_c_owner_with_b_parent_and_b_grandparent() {
        let payouts = plan_rebate(
            UserLevel::C,
            Some(member(2, UserLevel::B)),
            Some(member(1, UserLevel::B)),
            total_for_price(100),
        );
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].credits, 300_000);
    }

    #[test]
    fn test_no_parent_no_payout() {
        assert!(plan_rebate(UserLevel::C, None, None, total_for_price(100)).is_empty());
    }

    #[test]
    fn test_unlisted_combinations_pay_nothing() {
        let total = total_for_price(100);
        assert!(plan_rebate(UserLevel::A, Some(member(1, UserLevel::A)), None, total).is_empty());
        assert!(plan_rebate(UserLevel::B, Some(member(1, UserLevel::B)), None, total).is_empty());
        assert!(plan_rebate(UserLevel::B, Some(member(1, UserLevel::C)), None, total).is_empty());
        assert!(plan_rebate(UserLevel::C, Some(member(1, UserLevel::A)), None, total).is_empty());
    }

    #[test]
    fn test_fractional_amount_truncated() {
        // 0.33 元 * 10000 = 3300，30% = 990
        let total = credits_total(Decimal::new(33, 2), 10_000);
        let payouts = plan_rebate(UserLevel::C, Some(member(2, UserLevel::B)), None, total);
        assert_eq!(payouts[0].credits, 990);

        // 0.00001 元按 10% 不足 1 积分，不发放
        let tiny = credits_total(Decimal::new(1, 5), 10_000);
        assert!(plan_rebate(UserLevel::C, Some(member(2, UserLevel::C)), None, tiny).is_empty());
    }

    #[test]
    fn test_zero_price_pays_nothing() {
        let payouts = plan_rebate(
            UserLevel::C,
            Some(member(2, UserLevel::B)),
            Some(member(1, UserLevel::A)),
            Decimal::ZERO,
        );
        assert!(payouts.is_empty());
    }
}
