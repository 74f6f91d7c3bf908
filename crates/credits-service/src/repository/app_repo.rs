//! 开放应用仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::AppRepositoryTrait;
use crate::error::Result;
use crate::models::OpenApp;

pub struct AppRepository {
    pool: PgPool,
}

impl AppRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppRepositoryTrait for AppRepository {
    async fn find_by_app_id(&self, app_id: &str) -> Result<Option<OpenApp>> {
        let app = sqlx::query_as::<_, OpenApp>(
            "SELECT id, name, app_id, app_secret, created_at FROM open_apps WHERE app_id = $1",
        )
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(app)
    }
}
