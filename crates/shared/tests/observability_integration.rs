//! 指标记录集成测试
//!
//! 使用局部 recorder 渲染 Prometheus 文本，校验指标名称与标签。

use credits_shared::observability::metrics::{
    record_credits_change, record_job_run, record_purchase, record_rebate_payout,
    record_tier_promotions, record_treasure_sync, set_worker_last_run,
};
use metrics_exporter_prometheus::PrometheusBuilder;

fn render_with<F: FnOnce()>(f: F) -> String {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::with_local_recorder(&recorder, f);
    handle.render()
}

#[test]
fn test_credits_change_labels() {
    let output = render_with(|| {
        record_credits_change("mall_exchange", "success", 0.02);
        record_credits_change("mall_exchange", "DUPLICATE_ORDER", 0.01);
    });

    assert!(output.contains(r#"credits_changes_total{channel="mall_exchange",status="success"} 1"#));
    assert!(output.contains(r#"status="DUPLICATE_ORDER""#));
    assert!(output.contains("credits_change_duration_seconds"));
}

#[test]
fn test_rebate_payout_counts_credits() {
    let output = render_with(|| {
        record_rebate_payout("parent", 300_000);
        record_rebate_payout("grandparent", 100_000);
        record_rebate_payout("parent", 10);
    });

    assert!(output.contains(r#"rebate_payouts_total{relation="parent"} 2"#));
    assert!(output.contains(r#"rebate_credits_total{relation="parent"} 300010"#));
    assert!(output.contains(r#"rebate_credits_total{relation="grandparent"} 100000"#));
}

#[test]
fn test_job_and_sync_counters() {
    let output = render_with(|| {
        record_job_run("rebate", "skipped");
        record_job_run("rebate", "completed");
        record_treasure_sync("created", 3);
        record_tier_promotions("gold_holder", 0);
        record_purchase("success");
        set_worker_last_run("rebate");
    });

    assert!(output.contains(r#"job_runs_total{job="rebate",outcome="skipped"} 1"#));
    assert!(output.contains(r#"treasure_sync_total{outcome="created"} 3"#));
    assert!(output.contains(r#"purchases_total{status="success"} 1"#));
    assert!(output.contains(r#"worker_last_run_timestamp{worker="rebate"}"#));
}

#[test]
fn test_negative_rebate_credits_ignored() {
    let output = render_with(|| record_rebate_payout("parent", -5));
    assert!(output.contains(r#"rebate_credits_total{relation="parent"} 0"#));
}
