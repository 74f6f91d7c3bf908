//! 仓储层
//!
//! 封装 PostgreSQL 访问

mod app_repo;
mod credits_log_repo;
mod goods_repo;
mod order_repo;
mod traits;
mod treasure_repo;
mod user_repo;

pub use app_repo::AppRepository;
pub use credits_log_repo::CreditsLogRepository;
pub use goods_repo::GoodsRepository;
pub use order_repo::{OrderRepository, RecentOrderRow};
pub use traits::*;
pub use treasure_repo::TreasureRepository;
pub use user_repo::UserRepository;
