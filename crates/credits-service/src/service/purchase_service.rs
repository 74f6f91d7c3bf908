//! 商城兑换服务
//!
//! 一次兑换在单个事务内完成，任何一步失败都整体回滚：
//!
//! 1. 查询商品 -> 2. 上架与销售时间检查 -> 3. 计算成交价（考虑折扣）
//!    -> 4. 扣积分 -> 5. 扣库存 -> 6. 创建订单
//!
//! 扣积分先锁用户行，扣库存再锁商品行，所有兑换按同样顺序加锁。

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use validator::Validate;

use credits_shared::cache::{Cache, CacheKey};
use credits_shared::observability::metrics;

use crate::error::{CreditsError, Result};
use crate::id_gen::SnowflakeGenerator;
use crate::models::{CreditChange, CreditOperation, NewOrder, OpenApp};
use crate::repository::{GoodsRepository, OrderRepository, UserRepository};
use crate::service::dto::{PurchaseRequest, PurchaseResponse};
use crate::service::ledger_service::LedgerService;

/// 兑换流水的渠道
pub const CHANNEL_MALL_EXCHANGE: &str = "mall_exchange";

pub struct PurchaseService {
    pool: PgPool,
    id_gen: Arc<SnowflakeGenerator>,
    cache: Arc<Cache>,
    /// 兑换扣分记在商城应用名下
    mall_app: OpenApp,
}

impl PurchaseService {
    pub fn new(
        pool: PgPool,
        id_gen: Arc<SnowflakeGenerator>,
        cache: Arc<Cache>,
        mall_app: OpenApp,
    ) -> Self {
        Self {
            pool,
            id_gen,
            cache,
            mall_app,
        }
    }

    /// 用积分兑换商品
    #[instrument(skip(self), fields(user_id = request.user_id, goods_id = request.goods_id))]
    pub async fn purchase(&self, request: &PurchaseRequest) -> Result<PurchaseResponse> {
        request.validate()?;

        let result = self.execute_purchase(request).await;
        match &result {
            Ok(response) => {
                metrics::record_purchase("success");
                info!(
                    order_id = %response.order_id,
                    total_price = response.total_price,
                    credits_after = response.credits_after,
                    "Purchase completed"
                );
                self.invalidate_recent_orders().await;
            }
            Err(e) => {
                metrics::record_purchase(e.error_code());
                warn!(error = %e, "Purchase failed");
            }
        }
        result
    }

    async fn execute_purchase(&self, request: &PurchaseRequest) -> Result<PurchaseResponse> {
        let now = Utc::now();
        let quantity = i64::from(request.quantity);

        let mut tx = self.pool.begin().await?;

        let goods = GoodsRepository::find_by_id_in_tx(&mut tx, request.goods_id)
            .await?
            .ok_or(CreditsError::GoodsNotFound(request.goods_id))?;

        goods
            .validate()
            .map_err(|reason| CreditsError::GoodsUnavailable {
                goods_id: goods.id,
                reason,
            })?;
        goods
            .check_on_sale(now)
            .map_err(|reason| CreditsError::GoodsUnavailable {
                goods_id: goods.id,
                reason: reason.to_string(),
            })?;

        let user = UserRepository::find_by_id_in_tx(&mut tx, request.user_id)
            .await?
            .ok_or_else(|| CreditsError::UserNotFound(request.user_id.to_string()))?;

        let shipping = user.shipping();
        if !shipping.is_complete() {
            return Err(CreditsError::Validation("请先完善收货信息".to_string()));
        }

        let unit_price = goods.unit_price_at(now);
        let total_price = unit_price
            .checked_mul(quantity)
            .ok_or_else(|| CreditsError::Validation("订单金额溢出".to_string()))?;

        let order_id = self.id_gen.next_goods_order_id()?;

        let change = CreditChange::new(
            self.mall_app.id,
            &order_id,
            user.id,
            CreditOperation::Decrease,
            total_price,
            CHANNEL_MALL_EXCHANGE,
        );
        let ledger = LedgerService::apply_in_tx(&mut tx, &change).await?;

        let remaining = GoodsRepository::debit_inventory_in_tx(&mut tx, goods.id, quantity)
            .await?
            .ok_or(CreditsError::GoodsNotFound(goods.id))?;
        if remaining < 0 {
            return Err(CreditsError::InsufficientInventory {
                goods_id: goods.id,
                required: quantity,
            });
        }

        OrderRepository::create_in_tx(
            &mut tx,
            &NewOrder {
                order_id: order_id.clone(),
                user_id: user.id,
                goods_id: goods.id,
                unit_price,
                quantity: request.quantity,
                total_price,
                shipping,
            },
        )
        .await?;

        tx.commit().await?;

        Ok(PurchaseResponse {
            order_id,
            unit_price,
            total_price,
            credits_after: ledger.balance_after,
        })
    }

    async fn invalidate_recent_orders(&self) {
        let key = CacheKey::recent_orders(self.cache.key_prefix());
        if let Err(e) = self.cache.delete(&key).await {
            warn!(key = %key, error = %e, "Failed to invalidate recent orders cache");
        }
    }
}
