//! 数据模型模块
//!
//! 定义积分服务的所有数据库实体和领域类型

mod credits;
mod enums;
mod goods;
mod treasure;
mod user;

pub use credits::*;
pub use enums::*;
pub use goods::*;
pub use treasure::*;
pub use user::*;
