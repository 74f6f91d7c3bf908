//! 定时任务调度
//!
//! 按各自的间隔触发等级晋升和返利，收到关闭信号后退出循环。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use credits_shared::config::JobsConfig;
use credits_shared::observability::metrics;

use super::JobRunner;

pub struct JobScheduler {
    runner: Arc<JobRunner>,
    tier_interval: Duration,
    rebate_interval: Duration,
}

impl JobScheduler {
    pub fn new(runner: Arc<JobRunner>, tier_interval: Duration, rebate_interval: Duration) -> Self {
        Self {
            runner,
            tier_interval,
            rebate_interval,
        }
    }

    pub fn from_config(runner: Arc<JobRunner>, config: &JobsConfig) -> Self {
        Self::new(
            runner,
            Duration::from_secs(config.tier_interval_secs.max(1)),
            Duration::from_secs(config.rebate_interval_secs.max(1)),
        )
    }

    /// 主循环，直到 `shutdown` 变为 true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            tier_interval = ?self.tier_interval,
            rebate_interval = ?self.rebate_interval,
            "JobScheduler 已启动"
        );

        let mut tier_tick = interval(self.tier_interval);
        let mut rebate_tick = interval(self.rebate_interval);
        // 上一轮执行过久时不补跑
        tier_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        rebate_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tier_tick.tick() => {
                    self.runner.run_tier_promotion().await;
                    metrics::set_worker_last_run("tier_promotion");
                }
                _ = rebate_tick.tick() => {
                    self.runner.run_rebates().await;
                    metrics::set_worker_last_run("rebate");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("JobScheduler 已停止");
    }
}
