//! 服务层数据传输对象
//!
//! 外部调用方的请求与响应结构，与数据库实体解耦

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{CreditOperation, CreditsLog, Goods, Order, OrderStatus, ShippingInfo, mask_phone};

/// 大陆手机号：1 开头的 11 位数字
pub static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1[0-9]{10}$").unwrap());

fn validate_operation(operation: i16) -> Result<(), ValidationError> {
    if CreditOperation::from_i16(operation).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("operation").with_message("operation 只能为 1 或 -1".into()))
    }
}

/// 开放平台积分变动请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeCreditsRequest {
    #[validate(regex(path = *PHONE_REGEX, message = "手机号格式不正确"))]
    pub phone: String,
    #[validate(range(min = 1, message = "积分变动值必须大于 0"))]
    pub value: i64,
    #[validate(length(max = 150, message = "渠道不能超过150字符"))]
    #[serde(default)]
    pub channel: String,
    #[validate(length(min = 1, max = 150, message = "订单号不能为空且不超过150字符"))]
    pub order_id: String,
    #[validate(custom(function = "validate_operation"))]
    pub operation: i16,
}

impl ChangeCreditsRequest {
    /// 校验通过后解析出的变动方向
    pub fn credit_operation(&self) -> Option<CreditOperation> {
        CreditOperation::from_i16(self.operation)
    }
}

/// 积分变动响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeCreditsResponse {
    pub order_id: String,
    pub phone: String,
    pub credits: i64,
}

/// 商城兑换请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub user_id: i64,
    pub goods_id: i64,
    #[validate(range(min = 1, max = 999, message = "购买数量必须在 1 到 999 之间"))]
    pub quantity: i32,
}

/// 商城兑换响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub order_id: String,
    pub unit_price: i64,
    pub total_price: i64,
    pub credits_after: i64,
}

/// 设置收货信息请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShippingRequest {
    #[validate(length(min = 1, max = 150, message = "收货人不能为空且不超过150字符"))]
    pub express_name: String,
    #[validate(length(min = 1, max = 150, message = "联系电话不能为空且不超过150字符"))]
    pub express_phone: String,
    #[validate(length(min = 1, max = 150, message = "地区不能为空且不超过150字符"))]
    pub express_area: String,
    #[validate(length(min = 1, max = 150, message = "详细地址不能为空且不超过150字符"))]
    pub express_address: String,
}

impl UpdateShippingRequest {
    pub fn shipping(&self) -> ShippingInfo {
        ShippingInfo {
            name: self.express_name.trim().to_string(),
            phone: self.express_phone.trim().to_string(),
            area: self.express_area.trim().to_string(),
            address: self.express_address.trim().to_string(),
        }
    }
}

/// 分页查询参数
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationParams {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    /// 单页最多 100 条
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100)
    }
}

/// 分页响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PaginationParams) -> Self {
        let page_size = params.limit();
        Self {
            items,
            total,
            page: params.page.max(1),
            page_size,
            total_pages: (total + page_size - 1) / page_size,
        }
    }
}

/// 积分流水 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsLogDto {
    pub order_id: String,
    pub value: i64,
    pub operation: i16,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

impl From<CreditsLog> for CreditsLogDto {
    fn from(log: CreditsLog) -> Self {
        Self {
            order_id: log.order_id,
            value: log.value,
            operation: log.operation as i16,
            channel: log.channel,
            created_at: log.created_at,
        }
    }
}

/// 积分排行榜条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntryDto {
    pub rank: u32,
    pub phone: String,
    pub credits: i64,
}

/// 用户订单 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub order_id: String,
    pub goods_id: i64,
    pub unit_price: i64,
    pub quantity: i32,
    pub total_price: i64,
    pub status: OrderStatus,
    pub status_label: String,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderDto {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            goods_id: order.goods_id,
            unit_price: order.unit_price,
            quantity: order.quantity,
            total_price: order.total_price,
            status: order.status,
            status_label: order.status.label().to_string(),
            created_at: order.created_at,
        }
    }
}

/// 商品列表 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsDto {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub description: String,
    pub price: i64,
    /// 当前成交单价，折扣生效时为折扣价
    pub unit_price: i64,
    pub inventory: i64,
    pub inventory_total: i64,
    pub enable_sale_time_range: bool,
    pub sale_time_start: Option<DateTime<Utc>>,
    pub sale_time_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GoodsDto {
    pub fn new(goods: Goods, now: DateTime<Utc>) -> Self {
        Self {
            unit_price: goods.unit_price_at(now),
            id: goods.id,
            name: goods.name,
            image: goods.image,
            description: goods.description,
            price: goods.price,
            inventory: goods.inventory,
            inventory_total: goods.inventory_total,
            enable_sale_time_range: goods.enable_sale_time_range,
            sale_time_start: goods.sale_time_start,
            sale_time_end: goods.sale_time_end,
            created_at: goods.created_at,
        }
    }
}

/// 全站最新兑换记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrderDto {
    pub phone: String,
    pub goods_name: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl RecentOrderDto {
    pub fn new(phone: &str, goods_name: String, quantity: i32, created_at: DateTime<Utc>) -> Self {
        Self {
            phone: mask_phone(phone),
            goods_name,
            quantity,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> ChangeCreditsRequest {
        ChangeCreditsRequest {
            phone: "13812345678".to_string(),
            value: 100,
            channel: "签到".to_string(),
            order_id: "ext-001".to_string(),
            operation: 1,
        }
    }

    #[test]
    fn test_change_credits_request_valid() {
        let request = valid_request();
        assert!(request.validate().is_ok());
        assert_eq!(request.credit_operation(), Some(CreditOperation::Increase));
    }

    #[test]
    fn test_change_credits_request_bad_phone() {
        let mut request = valid_request();
        request.phone = "23812345678".to_string();
        assert!(request.validate().is_err());

        request.phone = "1381234567".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_change_credits_request_bad_value_and_operation() {
        let mut request = valid_request();
        request.value = 0;
        assert!(request.validate().is_err());

        let mut request = valid_request();
        request.operation = 0;
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("operation"));

        request.operation = -1;
        assert!(request.validate().is_ok());
        request.operation = 2;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_change_credits_request_order_id_length() {
        let mut request = valid_request();
        request.order_id = String::new();
        assert!(request.validate().is_err());

        request.order_id = "x".repeat(151);
        assert!(request.validate().is_err());

        request.order_id = "x".repeat(150);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_change_credits_request_deserialize() {
        let json = r#"{"phone":"13812345678","value":5,"orderId":"o-1","operation":-1}"#;
        let request: ChangeCreditsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.channel, "");
        assert_eq!(request.credit_operation(), Some(CreditOperation::Decrease));
    }

    #[test]
    fn test_purchase_request_quantity() {
        let request = PurchaseRequest {
            user_id: 1,
            goods_id: 1,
            quantity: 0,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_update_shipping_request() {
        let request = UpdateShippingRequest {
            express_name: " 张三 ".to_string(),
            express_phone: "13800001111".to_string(),
            express_area: "上海市浦东新区".to_string(),
            express_address: "世纪大道 1 号".to_string(),
        };
        assert!(request.validate().is_ok());
        assert_eq!(request.shipping().name, "张三");
        assert!(request.shipping().is_complete());

        let mut request = request;
        request.express_address = String::new();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("express_address"));
    }

    #[test]
    fn test_pagination() {
        let params = PaginationParams::new(3, 10);
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);

        let params = PaginationParams::new(0, 500);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), 100);
    }

    #[test]
    fn test_page_response_total_pages() {
        let page = PageResponse::new(vec![1, 2, 3], 21, &PaginationParams::new(1, 10));
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page_size, 10);

        let empty: PageResponse<i32> = PageResponse::new(vec![], 0, &PaginationParams::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_recent_order_masks_phone() {
        let dto = RecentOrderDto::new("13812345678", "保温杯".to_string(), 2, Utc::now());
        assert_eq!(dto.phone, "138****5678");
    }
}
