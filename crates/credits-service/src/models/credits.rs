//! 积分流水模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::enums::CreditOperation;

/// 积分流水
///
/// 只追加不修改，(app_id, order_id) 全局唯一
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditsLog {
    pub id: i64,
    pub order_id: String,
    pub user_id: i64,
    /// 变动量绝对值
    pub value: i64,
    pub operation: CreditOperation,
    pub channel: String,
    pub app_id: i64,
    pub created_at: DateTime<Utc>,
}

/// 待写入的积分变动
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditChange {
    pub app_id: i64,
    pub order_id: String,
    pub user_id: i64,
    pub operation: CreditOperation,
    pub value: i64,
    pub channel: String,
}

impl CreditChange {
    /// 构造积分变动，变动量统一取绝对值
    pub fn new(
        app_id: i64,
        order_id: impl Into<String>,
        user_id: i64,
        operation: CreditOperation,
        magnitude: i64,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            app_id,
            order_id: order_id.into(),
            user_id,
            operation,
            value: magnitude.saturating_abs(),
            channel: channel.into(),
        }
    }

    pub fn delta(&self) -> i64 {
        self.value * self.operation.sign()
    }
}

/// 积分变动结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditChangeResult {
    pub log_id: i64,
    pub user_id: i64,
    pub balance_after: i64,
}
