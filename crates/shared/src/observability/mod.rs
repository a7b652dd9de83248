//! 可观测性
//!
//! 引擎进程启动时调用一次 [`init`]：日志与追踪经 tracing-subscriber 输出，
//! 作业与任务指标经 Prometheus 暴露。作业执行时长跨度从毫秒到数分钟，
//! 直方图桶按作业耗时单独配置。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;
use serde::Deserialize;

/// 引擎 crate 的日志 target
const ENGINE_TARGET: &str = "assignment_engine";

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，由进程注入
    pub service_name: String,

    /// OpenTelemetry OTLP 端点，为空时不导出 span
    pub otlp_endpoint: Option<String>,

    pub metrics_enabled: bool,
    pub metrics_port: u16,

    /// 全局日志级别
    pub log_level: String,

    /// 只作用于 `assignment_engine` target 的日志级别
    pub engine_log_level: Option<String>,

    pub json_logs: bool,

    /// 作业耗时直方图的桶（秒）
    pub job_duration_buckets: Vec<f64>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "assignment-engine".to_string(),
            otlp_endpoint: None,
            metrics_enabled: true,
            metrics_port: 9090,
            log_level: "info".to_string(),
            engine_log_level: None,
            json_logs: false,
            job_duration_buckets: vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0],
        }
    }
}

impl ObservabilityConfig {
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }

    /// 组装 EnvFilter 指令，如 `info,assignment_engine=debug`
    pub fn filter_directives(&self) -> String {
        match &self.engine_log_level {
            Some(level) => format!("{},{}={}", self.log_level, ENGINE_TARGET, level),
            None => self.log_level.clone(),
        }
    }
}

/// 可观测性资源守卫
///
/// Drop 时关闭追踪 provider 并刷新待发送的 span
pub struct ObservabilityGuard {
    _metrics_handle: Option<metrics::MetricsHandle>,
    _tracing_guard: tracing::TracingGuard,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        info!("可观测性组件关闭");
    }
}

/// 初始化日志、追踪与指标
pub async fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let tracing_guard = tracing::init(config)?;

    info!(
        service = %config.service_name,
        filter = %config.filter_directives(),
        metrics_enabled = config.metrics_enabled,
        metrics_port = config.metrics_port,
        otlp_endpoint = ?config.otlp_endpoint,
        "可观测性已初始化"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(metrics::init(config).await?)
    } else {
        None
    };

    Ok(ObservabilityGuard {
        _metrics_handle: metrics_handle,
        _tracing_guard: tracing_guard,
    })
}
