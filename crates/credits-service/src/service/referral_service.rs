//! 邀请关系绑定
//!
//! 邀请人只能绑定一次。只允许绑定注册时间更早（id 更小）的用户，
//! 邀请关系因此天然无环。

use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::{CreditsError, Result};
use crate::models::{User, UserLevel};
use crate::repository::UserRepository;

/// 检查绑定是否合法，返回绑定后用户应有的等级
pub fn check_binding(user: &User, parent: &User) -> Result<UserLevel> {
    if user.parent_id.is_some() {
        return Err(CreditsError::ParentAlreadyBound(user.id));
    }
    if user.level == UserLevel::A {
        return Err(CreditsError::TopTierCannotBind(user.id));
    }
    if parent.id >= user.id {
        return Err(CreditsError::InvalidParent(format!(
            "邀请人 {} 必须早于用户 {} 注册",
            parent.id, user.id
        )));
    }

    // C 级用户绑定 A 级邀请人后直接成为 B 级
    if user.level == UserLevel::C && parent.level == UserLevel::A {
        Ok(UserLevel::B)
    } else {
        Ok(user.level)
    }
}

pub struct ReferralService {
    pool: PgPool,
}

impl ReferralService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 为用户绑定邀请人，返回绑定后的等级
    #[instrument(skip(self))]
    pub async fn bind_parent(&self, user_id: i64, parent_id: i64) -> Result<UserLevel> {
        let mut tx = self.pool.begin().await?;

        let user = UserRepository::lock_by_id_in_tx(&mut tx, user_id)
            .await?
            .ok_or_else(|| CreditsError::UserNotFound(user_id.to_string()))?;
        let parent = UserRepository::find_by_id_in_tx(&mut tx, parent_id)
            .await?
            .ok_or_else(|| CreditsError::InvalidParent(format!("邀请人不存在: {}", parent_id)))?;

        let level = check_binding(&user, &parent)?;

        if !UserRepository::bind_parent_in_tx(&mut tx, user.id, parent.id, level).await? {
            return Err(CreditsError::ParentAlreadyBound(user.id));
        }
        tx.commit().await?;

        info!(level = %level, "Parent bound");
        Ok(level)
    }
}
