//! 共享库
//!
//! 积分服务与后台任务共用的配置、错误处理、数据库连接、缓存和可观测性基础设施。

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod test_utils;
