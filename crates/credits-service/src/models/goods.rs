//! 商品与订单模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::enums::OrderStatus;
use super::user::ShippingInfo;

/// 商城商品
///
/// 价格以积分计。折扣时间段和销售时间段最多只能启用一个
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Goods {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub description: String,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub enable_discount: bool,
    pub discount_start: Option<DateTime<Utc>>,
    pub discount_end: Option<DateTime<Utc>>,
    /// 当前库存
    pub inventory: i64,
    /// 初始库存，仅用于展示
    pub inventory_total: i64,
    /// 是否上架
    pub status: bool,
    pub enable_sale_time_range: bool,
    pub sale_time_start: Option<DateTime<Utc>>,
    pub sale_time_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Goods {
    /// 校验价格配置
    ///
    /// 返回第一个不合法项的描述
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.enable_discount && self.enable_sale_time_range {
            return Err("折扣时间段和销售时间段不能同时启用".to_string());
        }
        if self.price < 0 {
            return Err("商品价格不能为负数".to_string());
        }
        if self.inventory < 0 || self.inventory_total < 0 {
            return Err("商品库存不能为负数".to_string());
        }
        if self.enable_discount {
            match (self.discount_price, self.discount_start, self.discount_end) {
                (Some(p), Some(start), Some(end)) if p >= 0 && start < end => {}
                _ => return Err("折扣价格或折扣时间段配置不完整".to_string()),
            }
        }
        if self.enable_sale_time_range {
            match (self.sale_time_start, self.sale_time_end) {
                (Some(start), Some(end)) if start < end => {}
                _ => return Err("销售时间段配置不完整".to_string()),
            }
        }
        Ok(())
    }

    /// 折扣是否在指定时间生效
    pub fn discount_active_at(&self, now: DateTime<Utc>) -> bool {
        if !self.enable_discount || self.discount_price.is_none() {
            return false;
        }
        within(now, self.discount_start, self.discount_end)
    }

    /// 指定时间的成交单价
    pub fn unit_price_at(&self, now: DateTime<Utc>) -> i64 {
        match self.discount_price {
            Some(p) if self.discount_active_at(now) => p,
            _ => self.price,
        }
    }

    /// 检查商品在指定时间是否可售
    ///
    /// 不可售时返回原因
    pub fn check_on_sale(&self, now: DateTime<Utc>) -> std::result::Result<(), &'static str> {
        if !self.status {
            return Err("商品已下架");
        }
        if self.enable_sale_time_range && !within(now, self.sale_time_start, self.sale_time_end) {
            return Err("不在销售时间段内");
        }
        Ok(())
    }
}

/// 时间窗口为左闭右开区间，缺失的边界视为不限
fn within(now: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.is_none_or(|s| now >= s) && end.is_none_or(|e| now < e)
}

/// 商城订单
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub order_id: String,
    pub user_id: i64,
    pub goods_id: i64,
    pub unit_price: i64,
    pub quantity: i32,
    pub total_price: i64,
    pub status: OrderStatus,
    pub express_name: String,
    pub express_phone: String,
    pub express_area: String,
    pub express_address: String,
    pub created_at: DateTime<Utc>,
}

/// 待创建的订单
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: String,
    pub user_id: i64,
    pub goods_id: i64,
    pub unit_price: i64,
    pub quantity: i32,
    pub total_price: i64,
    pub shipping: ShippingInfo,
}
