//! 用户资料服务

use std::sync::Arc;

use tracing::{info, instrument};
use validator::Validate;

use crate::error::{CreditsError, Result};
use crate::models::ShippingInfo;
use crate::repository::UserRepositoryTrait;
use crate::service::dto::UpdateShippingRequest;

pub struct UserService<UR: UserRepositoryTrait> {
    user_repo: Arc<UR>,
}

impl<UR: UserRepositoryTrait> UserService<UR> {
    pub fn new(user_repo: Arc<UR>) -> Self {
        Self { user_repo }
    }

    /// 当前收货信息
    pub async fn get_shipping(&self, user_id: i64) -> Result<ShippingInfo> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .map(|user| user.shipping())
            .ok_or_else(|| CreditsError::UserNotFound(user_id.to_string()))
    }

    /// 设置收货信息，四项都必须填写
    #[instrument(skip(self, request))]
    pub async fn update_shipping(
        &self,
        user_id: i64,
        request: &UpdateShippingRequest,
    ) -> Result<ShippingInfo> {
        request.validate()?;

        let shipping = request.shipping();
        if !shipping.is_complete() {
            return Err(CreditsError::Validation("请填写完整".to_string()));
        }

        if !self.user_repo.update_shipping(user_id, &shipping).await? {
            return Err(CreditsError::UserNotFound(user_id.to_string()));
        }

        info!("Shipping info updated");
        Ok(shipping)
    }
}
