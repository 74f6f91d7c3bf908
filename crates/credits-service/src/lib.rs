//! 积分服务
//!
//! 多应用积分账本、积分商城兑换、藏品持有同步与基于邀请关系的返利。
//!
//! ## 核心功能
//!
//! - **积分账本**：按 (应用, 订单号) 幂等的积分增减，余额不会为负
//! - **商城兑换**：扣积分、扣库存、下单在同一事务内完成
//! - **藏品同步**：从外部平台拉取用户持有的藏品并落库
//! - **等级晋升**：A/B/C 三级用户按规则只升不降
//! - **返利发放**：下级持有带价格藏品时，按邀请链向上发放积分
//! - **后台任务**：分布式锁保护的定时晋升与返利
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `id_gen`: 雪花 ID 生成器
//! - `lock`: 分布式锁模块
//! - `repository`: 数据库仓储层
//! - `service`: 业务服务层
//! - `worker`: 后台任务调度

pub mod error;
pub mod id_gen;
pub mod lock;
pub mod models;
pub mod repository;
pub mod service;
pub mod worker;

pub use error::{CreditsError, Result};
pub use id_gen::SnowflakeGenerator;
pub use lock::{LockConfig, LockGuard, LockManager};
pub use models::*;
pub use repository::{
    AppRepository, CreditsLogRepository, GoodsRepository, OrderRepository, TreasureRepository,
    UserRepository,
};
pub use service::{
    AppService, LedgerService, OrderService, OwnershipSupplier, OwnershipSyncService,
    PurchaseService, QueryService, RebateService, ReferralService, TierService, UserService, dto,
};
pub use worker::{JobRunner, JobScheduler};
