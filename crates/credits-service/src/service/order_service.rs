//! 订单履约服务

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::{CreditsError, Result};
use crate::models::OrderStatus;
use crate::repository::OrderRepositoryTrait;

pub struct OrderService<OR: OrderRepositoryTrait> {
    order_repo: Arc<OR>,
}

impl<OR: OrderRepositoryTrait> OrderService<OR> {
    pub fn new(order_repo: Arc<OR>) -> Self {
        Self { order_repo }
    }

    /// 推进订单履约状态
    ///
    /// 只允许前进到紧邻的下一个状态；并发推进同一订单时只有一个会成功
    #[instrument(skip(self))]
    pub async fn advance_order_status(&self, order_id: &str, next: OrderStatus) -> Result<()> {
        let order = self
            .order_repo
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| CreditsError::OrderNotFound(order_id.to_string()))?;

        let current = order.status;
        let invalid = || CreditsError::InvalidOrderStatus {
            order_id: order_id.to_string(),
            current_status: current.label().to_string(),
        };

        if !current.can_transition_to(next) {
            return Err(invalid());
        }

        // 状态已被其他请求改动
        if !self.order_repo.update_status(order_id, current, next).await? {
            return Err(invalid());
        }

        info!(from = ?current, to = ?next, "Order status advanced");
        Ok(())
    }
}
