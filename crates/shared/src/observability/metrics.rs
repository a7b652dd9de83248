//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("scheduler_job_duration_seconds".to_string()),
            &config.job_duration_buckets,
        )?
        .install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册调度引擎指标说明
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("scheduler_job_runs_total", "Total number of scheduler job runs");
    metrics::describe_histogram!(
        "scheduler_job_duration_seconds",
        "Scheduler job duration in seconds"
    );
    metrics::describe_gauge!(
        "worker_last_run_timestamp_seconds",
        "Unix timestamp of the last worker loop iteration"
    );

    metrics::describe_counter!(
        "assignments_scheduled_total",
        "Assignments moved from WAITING to SCHEDULED"
    );
    metrics::describe_counter!(
        "campaigns_behind_schedule_total",
        "Campaigns that could not fill their weekly quota"
    );
    metrics::describe_counter!("materials_released_total", "Materials released to readers");
    metrics::describe_counter!("campaign_credits_debited_total", "Campaign credits consumed");
    metrics::describe_counter!("campaign_auto_pauses_total", "Campaigns auto-paused");
    metrics::describe_counter!("deadline_reminders_total", "Deadline reminders dispatched");
    metrics::describe_counter!("assignments_expired_total", "Assignments expired past deadline");
    metrics::describe_counter!(
        "assignment_reassignments_total",
        "Waiting readers promoted into freed slots"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
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

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次作业执行
#[inline]
pub fn record_job_run(job: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "scheduler_job_runs_total",
        "job" => job.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "scheduler_job_duration_seconds",
        "job" => job.to_string()
    )
    .record(duration_secs);
}

/// 记录 Worker 最近一次循环时间，供告警判断 Worker 是否存活
#[inline]
pub fn set_worker_last_run(worker: &str) {
    metrics::gauge!(
        "worker_last_run_timestamp_seconds",
        "worker" => worker.to_string()
    )
    .set(chrono::Utc::now().timestamp() as f64);
}

/// 记录分配结果（基础名额与超额缓冲分开统计）
#[inline]
pub fn record_assignments_scheduled(base: u64, buffer: u64) {
    metrics::counter!("assignments_scheduled_total", "pool" => "base").increment(base);
    metrics::counter!("assignments_scheduled_total", "pool" => "buffer").increment(buffer);
}

/// 记录未能填满周配额的活动
#[inline]
pub fn record_behind_schedule(count: u64) {
    metrics::counter!("campaigns_behind_schedule_total").increment(count);
}

/// 记录资料发放
#[inline]
pub fn record_materials_released(format: &str, credits: u64) {
    metrics::counter!("materials_released_total", "format" => format.to_string()).increment(1);
    metrics::counter!("campaign_credits_debited_total").increment(credits);
}

/// 记录活动自动暂停
#[inline]
pub fn record_campaign_paused(reason: &str) {
    metrics::counter!("campaign_auto_pauses_total", "reason" => reason.to_string()).increment(1);
}

/// 记录截止提醒发送结果
#[inline]
pub fn record_reminder(reminder_type: &str, status: &str) {
    metrics::counter!(
        "deadline_reminders_total",
        "type" => reminder_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录过期与补位
#[inline]
pub fn record_assignment_expired(promoted: bool) {
    metrics::counter!("assignments_expired_total").increment(1);
    if promoted {
        metrics::counter!("assignment_reassignments_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 未安装 recorder 时也不应 panic
        record_job_run("weekly-distribution", "success", 0.5);
        set_worker_last_run("cron_worker");
        record_assignments_scheduled(10, 2);
        record_behind_schedule(1);
        record_materials_released("AUDIOBOOK", 2);
        record_campaign_paused("insufficient_credits");
        record_reminder("24H", "sent");
        record_assignment_expired(true);
    }
}
