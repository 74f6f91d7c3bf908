//! 分布式锁模块
//!
//! 用于保证等级晋升和返利这类后台任务在集群内同一时刻只运行一个实例。
//!
//! ```ignore
//! let guard = lock_manager.acquire("do_rebate").await?;
//! run_rebates().await?;
//! guard.release().await?;
//! ```

mod lock_manager;

pub use lock_manager::{LockConfig, LockGuard, LockManager};
