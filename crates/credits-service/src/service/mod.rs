//! 业务服务层
//!
//! 写操作统一经过 `LedgerService` 落账，查询走带缓存的 `QueryService`。

pub mod app_service;
pub mod dto;
pub mod ledger_service;
pub mod order_service;
pub mod ownership_sync;
pub mod purchase_service;
pub mod query_service;
pub mod rebate_service;
pub mod referral_service;
pub mod tier_service;
pub mod user_service;

pub use app_service::AppService;
pub use ledger_service::LedgerService;
pub use order_service::OrderService;
pub use ownership_sync::{OwnershipSupplier, OwnershipSyncService};
pub use purchase_service::{CHANNEL_MALL_EXCHANGE, PurchaseService};
pub use query_service::QueryService;
pub use rebate_service::{CHANNEL_REBATE, RebateReport, RebateService};
pub use referral_service::ReferralService;
pub use tier_service::{TierReport, TierService};
pub use user_service::UserService;
