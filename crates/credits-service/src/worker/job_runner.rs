//! 加锁执行的后台任务
//!
//! 定时调度和藏品同步都会触发同一组任务，集群内通过任务锁保证同一时刻只有一个实例在跑。

use std::sync::Arc;

use tracing::{error, info, warn};

use credits_shared::observability::metrics;

use crate::error::CreditsError;
use crate::lock::LockManager;
use crate::service::{RebateReport, RebateService, TierReport, TierService};

/// 等级晋升任务锁
pub const TIER_JOB_LOCK: &str = "do_update_user_level";
/// 返利任务锁
pub const REBATE_JOB_LOCK: &str = "do_rebate";

pub struct JobRunner {
    lock_manager: Arc<LockManager>,
    tier: Arc<TierService>,
    rebate: Arc<RebateService>,
}

impl JobRunner {
    pub fn new(
        lock_manager: Arc<LockManager>,
        tier: Arc<TierService>,
        rebate: Arc<RebateService>,
    ) -> Self {
        Self {
            lock_manager,
            tier,
            rebate,
        }
    }

    /// 执行一轮等级晋升
    ///
    /// 拿不到锁或执行失败时返回 None，错误只记录日志
    pub async fn run_tier_promotion(&self) -> Option<TierReport> {
        self.run_locked("tier_promotion", TIER_JOB_LOCK, || self.tier.run_promotions())
            .await
    }

    /// 执行一轮返利发放
    pub async fn run_rebates(&self) -> Option<RebateReport> {
        self.run_locked("rebate", REBATE_JOB_LOCK, || self.rebate.run_rebates())
            .await
    }

    async fn run_locked<T, F, Fut>(&self, job: &str, lock_name: &str, task: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        let guard = match self.lock_manager.acquire(lock_name).await {
            Ok(guard) => guard,
            Err(CreditsError::LockUnavailable { .. }) => {
                warn!(job, lock = lock_name, "Job lock busy, skipping this run");
                metrics::record_job_run(job, "skipped");
                return None;
            }
            Err(e) => {
                error!(job, lock = lock_name, error = %e, "Failed to acquire job lock");
                metrics::record_job_run(job, "failed");
                return None;
            }
        };

        let result = task().await;

        if let Err(e) = guard.release().await {
            warn!(job, lock = lock_name, error = %e, "Failed to release job lock");
        }

        match result {
            Ok(report) => {
                info!(job, "Job completed");
                metrics::record_job_run(job, "completed");
                Some(report)
            }
            Err(e) => {
                error!(job, error = %e, "Job failed");
                metrics::record_job_run(job, "failed");
                None
            }
        }
    }
}
