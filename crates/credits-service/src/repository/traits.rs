//! 仓储 Trait 定义
//!
//! 只读查询走 trait，便于服务层用 mock 测试；事务内写操作使用各仓储的 `*_in_tx` 关联函数

use async_trait::async_trait;

use super::order_repo::RecentOrderRow;
use crate::error::Result;
use crate::models::{CreditsLog, Goods, OpenApp, Order, OrderStatus, ShippingInfo, User};

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>>;
    async fn top_by_credits(&self, limit: i64) -> Result<Vec<User>>;
    /// 覆盖四项收货信息，用户不存在时返回 false
    async fn update_shipping(&self, id: i64, shipping: &ShippingInfo) -> Result<bool>;
}

/// 商品仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GoodsRepositoryTrait: Send + Sync {
    /// 上架商品，新的在前
    async fn list_on_shelf(&self, limit: i64, offset: i64) -> Result<Vec<Goods>>;
    async fn count_on_shelf(&self) -> Result<i64>;
}

/// 开放应用仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppRepositoryTrait: Send + Sync {
    async fn find_by_app_id(&self, app_id: &str) -> Result<Option<OpenApp>>;
}

/// 积分流水仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreditsLogRepositoryTrait: Send + Sync {
    async fn find_by_order(&self, app_id: i64, order_id: &str) -> Result<Option<CreditsLog>>;
    async fn list_by_user_and_app(
        &self,
        user_id: i64,
        app_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditsLog>>;
    async fn count_by_user_and_app(&self, user_id: i64, app_id: i64) -> Result<i64>;
    /// 累计获得的积分（只统计增加方向）
    async fn sum_earned(&self, user_id: i64) -> Result<i64>;
}

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Order>>;
    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Order>>;
    async fn count_by_user(&self, user_id: i64) -> Result<i64>;
    async fn list_recent(&self, limit: i64) -> Result<Vec<RecentOrderRow>>;
    /// 状态比较并交换，当前状态不是 `from` 时返回 false
    async fn update_status(&self, order_id: &str, from: OrderStatus, to: OrderStatus)
    -> Result<bool>;
}
