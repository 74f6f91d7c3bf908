//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("credits_changes_total", "Total number of credits changes");
    metrics::describe_histogram!(
        "credits_change_duration_seconds",
        "Credits change duration in seconds"
    );
    metrics::describe_counter!("purchases_total", "Total number of mall purchases");
    metrics::describe_counter!("treasure_sync_total", "Total number of synced treasure records");
    metrics::describe_counter!("rebate_payouts_total", "Total number of rebate payouts");
    metrics::describe_counter!("rebate_credits_total", "Total credits paid out as rebates");
    metrics::describe_counter!("tier_promotions_total", "Total number of tier promotions");
    metrics::describe_counter!("job_runs_total", "Total number of background job runs");
    metrics::describe_gauge!(
        "worker_last_run_timestamp",
        "Unix timestamp of the worker's last loop iteration"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录积分变动
#[inline]
pub fn record_credits_change(channel: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "credits_changes_total",
        "channel" => channel.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "credits_change_duration_seconds",
        "channel" => channel.to_string()
    )
    .record(duration_secs);
}

/// 记录商城下单
#[inline]
pub fn record_purchase(status: &str) {
    metrics::counter!("purchases_total", "status" => status.to_string()).increment(1);
}

/// 记录藏品同步结果
#[inline]
pub fn record_treasure_sync(outcome: &str, count: u64) {
    metrics::counter!("treasure_sync_total", "outcome" => outcome.to_string()).increment(count);
}

/// 记录一笔返利发放
#[inline]
pub fn record_rebate_payout(relation: &str, credits: i64) {
    metrics::counter!("rebate_payouts_total", "relation" => relation.to_string()).increment(1);
    metrics::counter!("rebate_credits_total", "relation" => relation.to_string())
        .increment(credits.max(0) as u64);
}

/// 记录等级晋升
#[inline]
pub fn record_tier_promotions(rule: &str, count: u64) {
    metrics::counter!("tier_promotions_total", "rule" => rule.to_string()).increment(count);
}

/// 记录后台任务执行结果（completed / skipped / failed）
#[inline]
pub fn record_job_run(job: &str, outcome: &str) {
    metrics::counter!(
        "job_runs_total",
        "job" => job.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录 Worker 最近一次循环的时间，供告警判断 Worker 是否存活
#[inline]
pub fn set_worker_last_run(worker: &str) {
    metrics::gauge!("worker_last_run_timestamp", "worker" => worker.to_string())
        .set(chrono::Utc::now().timestamp() as f64);
}
