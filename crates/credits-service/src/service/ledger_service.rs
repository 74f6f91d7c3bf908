//! 积分账本服务
//!
//! 积分变动的唯一入口。一次变动在同一个事务内完成：
//!
//! 1. 锁定用户行（同一用户的并发变动串行执行）
//! 2. 写入流水（(app_id, order_id) 冲突即判定为重复订单）
//! 3. 原子增减余额
//! 4. 余额为负则整体回滚
//!
//! 重复订单的判定与余额更新在同一事务内完成，并发提交同一订单号时只有一个会成功。

use std::time::Instant;

use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};
use validator::Validate;

use credits_shared::observability::metrics;

use crate::error::{CreditsError, Result};
use crate::models::{CreditChange, CreditChangeResult, OpenApp};
use crate::repository::{CreditsLogRepository, UserRepository};
use crate::service::dto::{ChangeCreditsRequest, ChangeCreditsResponse};

pub struct LedgerService {
    pool: PgPool,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在独立事务中执行一次积分变动
    #[instrument(
        skip(self, change),
        fields(
            app_id = change.app_id,
            order_id = %change.order_id,
            user_id = change.user_id,
            delta = change.delta(),
            channel = %change.channel
        )
    )]
    pub async fn apply_credit_change(&self, change: &CreditChange) -> Result<CreditChangeResult> {
        let start = Instant::now();

        let result = async {
            let mut tx = self.pool.begin().await?;
            let result = Self::apply_in_tx(&mut tx, change).await?;
            tx.commit().await?;
            Ok::<_, CreditsError>(result)
        }
        .await;

        record_outcome(&change.channel, &result, start);
        result
    }

    /// 在调用方事务中执行积分变动
    ///
    /// 返回错误时调用方必须放弃事务，已写入的流水和余额随之回滚
    pub async fn apply_in_tx(
        tx: &mut PgConnection,
        change: &CreditChange,
    ) -> Result<CreditChangeResult> {
        let user = UserRepository::lock_by_id_in_tx(&mut *tx, change.user_id)
            .await?
            .ok_or_else(|| CreditsError::UserNotFound(change.user_id.to_string()))?;

        let log_id = CreditsLogRepository::insert_in_tx(&mut *tx, change)
            .await?
            .ok_or_else(|| CreditsError::DuplicateOrder {
                app_id: change.app_id,
                order_id: change.order_id.clone(),
            })?;

        let balance_after =
            UserRepository::add_credits_in_tx(&mut *tx, change.user_id, change.delta()).await?;
        if balance_after < 0 {
            return Err(CreditsError::InsufficientCredits {
                user_id: change.user_id,
                required: change.value,
                available: user.credits,
            });
        }

        Ok(CreditChangeResult {
            log_id,
            user_id: change.user_id,
            balance_after,
        })
    }

    /// 开放平台按手机号变动积分
    ///
    /// 用户不存在时自动创建；变动失败时新建的用户一并回滚
    #[instrument(skip(self, app, request), fields(app = %app.app_id, order_id = %request.order_id))]
    pub async fn change_credits_by_phone(
        &self,
        app: &OpenApp,
        request: &ChangeCreditsRequest,
    ) -> Result<ChangeCreditsResponse> {
        request.validate()?;
        let operation = request
            .credit_operation()
            .ok_or_else(|| CreditsError::Validation("operation 只能为 1 或 -1".to_string()))?;

        let start = Instant::now();
        let result = async {
            let mut tx = self.pool.begin().await?;
            let user = UserRepository::get_or_create_by_phone_in_tx(&mut tx, &request.phone).await?;
            let change = CreditChange::new(
                app.id,
                &request.order_id,
                user.id,
                operation,
                request.value,
                &request.channel,
            );
            let result = Self::apply_in_tx(&mut tx, &change).await?;
            tx.commit().await?;
            Ok::<_, CreditsError>(result)
        }
        .await;
        record_outcome(&request.channel, &result, start);

        let result = result?;
        info!(
            user_id = result.user_id,
            balance_after = result.balance_after,
            "Credits changed"
        );

        Ok(ChangeCreditsResponse {
            order_id: request.order_id.clone(),
            phone: request.phone.clone(),
            credits: result.balance_after,
        })
    }
}

fn record_outcome(channel: &str, result: &Result<CreditChangeResult>, start: Instant) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => {
            if e.is_business_error() {
                warn!(error = %e, code = e.error_code(), "Credits change rejected");
            } else {
                warn!(error = %e, "Credits change failed");
            }
            e.error_code()
        }
    };
    metrics::record_credits_change(channel, status, start.elapsed().as_secs_f64());
}
