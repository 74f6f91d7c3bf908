//! 积分服务枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 用户等级
///
/// A > B > C，A 为最高等级。等级只会被晋升，定时任务不会降级
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar")]
pub enum UserLevel {
    /// 持有金卡藏品的顶级用户
    A,
    B,
    /// 新注册用户
    #[default]
    C,
}

impl UserLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl std::fmt::Display for UserLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 积分变动方向
///
/// 数据库中以 1 / -1 存储，流水中的 value 始终为非负数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum CreditOperation {
    Increase = 1,
    Decrease = -1,
}

impl CreditOperation {
    /// 方向系数
    pub fn sign(&self) -> i64 {
        *self as i16 as i64
    }

    /// 从外部传入的 1 / -1 解析
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(Self::Increase),
            -1 => Some(Self::Decrease),
            _ => None,
        }
    }

    /// 将带符号的变动量拆成方向和绝对值
    pub fn split(delta: i64) -> (Self, i64) {
        if delta < 0 {
            (Self::Decrease, delta.saturating_abs())
        } else {
            (Self::Increase, delta)
        }
    }
}

/// 商城订单状态
///
/// 状态流转：Pending -> Shipped -> InTransit -> Delivered，只能向前推进
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum OrderStatus {
    /// 待发货
    #[default]
    Pending = 1,
    /// 已发货
    Shipped = 2,
    /// 运输中
    InTransit = 3,
    /// 已签收
    Delivered = 4,
}

impl OrderStatus {
    pub fn as_i16(&self) -> i16 {
        *self as i16
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(Self::Pending),
            2 => Some(Self::Shipped),
            3 => Some(Self::InTransit),
            4 => Some(Self::Delivered),
            _ => None,
        }
    }

    /// 是否允许流转到目标状态
    ///
    /// 只允许推进到紧邻的下一个状态
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        next.as_i16() == self.as_i16() + 1
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "待发货",
            Self::Shipped => "已发货",
            Self::InTransit => "运输中",
            Self::Delivered => "已签收",
        }
    }
}
