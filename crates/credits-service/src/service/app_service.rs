//! 开放应用鉴权

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::error::{CreditsError, Result};
use crate::models::OpenApp;
use crate::repository::AppRepositoryTrait;

pub struct AppService<AR: AppRepositoryTrait> {
    app_repo: Arc<AR>,
}

impl<AR: AppRepositoryTrait> AppService<AR> {
    pub fn new(app_repo: Arc<AR>) -> Self {
        Self { app_repo }
    }

    /// 校验 app_id 与密钥
    ///
    /// 应用不存在和密钥错误返回同一种错误
    #[instrument(skip(self, app_secret))]
    pub async fn authenticate_app(&self, app_id: &str, app_secret: &str) -> Result<OpenApp> {
        match self.app_repo.find_by_app_id(app_id).await? {
            Some(app) if constant_time_eq(app.app_secret.as_bytes(), app_secret.as_bytes()) => {
                Ok(app)
            }
            _ => {
                warn!(app_id = %app_id, "Open app authentication failed");
                Err(CreditsError::AppNotFound(app_id.to_string()))
            }
        }
    }

    /// 按 app_id 加载内部应用，不校验密钥
    pub async fn load_internal_app(&self, app_id: &str) -> Result<OpenApp> {
        self.app_repo
            .find_by_app_id(app_id)
            .await?
            .ok_or_else(|| CreditsError::AppNotFound(app_id.to_string()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
