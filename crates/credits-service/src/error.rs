//! 积分服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use thiserror::Error;

use credits_shared::error::SharedError;

/// 积分服务错误类型
#[derive(Debug, Error)]
pub enum CreditsError {
    // === 积分账本相关错误 ===
    #[error("订单号重复: app_id={app_id}, order_id={order_id}")]
    DuplicateOrder { app_id: i64, order_id: String },

    #[error("积分不足: user_id={user_id}, 需要 {required}, 可用 {available}")]
    InsufficientCredits {
        user_id: i64,
        required: i64,
        available: i64,
    },

    #[error("用户不存在: {0}")]
    UserNotFound(String),

    #[error("应用不存在或密钥错误: {0}")]
    AppNotFound(String),

    // === 商品与订单相关错误 ===
    #[error("商品不存在: {0}")]
    GoodsNotFound(i64),

    #[error("商品不可购买: goods_id={goods_id}, {reason}")]
    GoodsUnavailable { goods_id: i64, reason: String },

    #[error("商品库存不足: goods_id={goods_id}, 需要 {required}")]
    InsufficientInventory { goods_id: i64, required: i64 },

    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    #[error("订单状态不允许此操作: order_id={order_id}, current_status={current_status}")]
    InvalidOrderStatus {
        order_id: String,
        current_status: String,
    },

    // === 邀请关系相关错误 ===
    #[error("用户已绑定邀请人: user_id={0}")]
    ParentAlreadyBound(i64),

    #[error("A 级用户不能绑定邀请人: user_id={0}")]
    TopTierCannotBind(i64),

    #[error("无效的邀请人: {0}")]
    InvalidParent(String),

    // === 外部依赖与调度相关错误 ===
    #[error("上游服务不可用: {0}")]
    UpstreamUnavailable(String),

    #[error("分布式锁获取失败: {resource}")]
    LockUnavailable { resource: String },

    #[error("系统时钟回拨: last={last_timestamp}, now={now}")]
    ClockMovedBackwards { last_timestamp: i64, now: i64 },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis 错误: {0}")]
    Redis(String),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("参数校验失败: {0}")]
    Validation(String),
}

/// 积分服务 Result 类型别名
pub type Result<T> = std::result::Result<T, CreditsError>;

impl From<SharedError> for CreditsError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::Database(e) => Self::Database(e),
            SharedError::Redis(e) => Self::Redis(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for CreditsError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl CreditsError {
    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Redis(_)
                | Self::UpstreamUnavailable(_)
                | Self::LockUnavailable { .. }
        )
    }

    /// 检查是否为业务错误（非系统错误）
    ///
    /// 业务错误可直接作为提示信息返回给调用方
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Serialization(_)
                | Self::Redis(_)
                | Self::Internal(_)
                | Self::UpstreamUnavailable(_)
                | Self::LockUnavailable { .. }
                | Self::ClockMovedBackwards { .. }
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateOrder { .. } => "DUPLICATE_ORDER",
            Self::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::AppNotFound(_) => "APP_NOT_FOUND",
            Self::GoodsNotFound(_) => "GOODS_NOT_FOUND",
            Self::GoodsUnavailable { .. } => "GOODS_UNAVAILABLE",
            Self::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::InvalidOrderStatus { .. } => "INVALID_ORDER_STATUS",
            Self::ParentAlreadyBound(_) => "PARENT_ALREADY_BOUND",
            Self::TopTierCannotBind(_) => "TOP_TIER_CANNOT_BIND",
            Self::InvalidParent(_) => "INVALID_PARENT",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::LockUnavailable { .. } => "LOCK_UNAVAILABLE",
            Self::ClockMovedBackwards { .. } => "CLOCK_MOVED_BACKWARDS",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// 面向终端用户的提示信息
    ///
    /// 系统错误统一隐藏细节，只返回通用提示
    pub fn user_message(&self) -> String {
        if self.is_business_error() {
            self.to_string()
        } else {
            "系统繁忙，请稍后再试".to_string()
        }
    }
}
