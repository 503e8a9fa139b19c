//! 日志与指标
//!
//! 日志格式和级别来自 `logging` 配置，`RUST_LOG` 存在时优先。
//! sqlx 的逐条查询日志默认压到 warn，避免执行历史写入刷屏。

use crate::config::{AppConfig, LoggingConfig};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// 执行记录总数，标签 status / target
pub const METRIC_RUNS_TOTAL: &str = "actions.runs.total";
/// 实际执行的耗时
pub const METRIC_RUN_DURATION_MS: &str = "actions.run.duration_ms";
/// 超时被终止的执行
pub const METRIC_RUN_TIMEOUTS: &str = "actions.runs.timeouts";
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";
pub const METRIC_HTTP_DURATION: &str = "http_request_duration_seconds";
pub const METRIC_DB_POOL_SIZE: &str = "db.pool.size";
pub const METRIC_DB_POOL_IDLE: &str = "db.pool.idle";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// 未识别的格式按 compact 处理
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// 配置中的级别加上依赖库的降噪指令
fn default_directives(logging: &LoggingConfig) -> String {
    format!("{},sqlx=warn,tower_http=info", logging.level.trim())
}

fn build_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(logging)))
}

/// 初始化日志；重复初始化返回错误而不是 panic
pub fn init_telemetry(config: &AppConfig) -> anyhow::Result<()> {
    let format = LogFormat::from_config(&config.logging.format);

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(&config.logging))
        .with(log_layer)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.logging.level,
        format = ?format,
        local_timeout_secs = config.execution.local_timeout_secs,
        ssh_timeout_secs = config.execution.ssh_timeout_secs,
        "Telemetry initialized"
    );
    Ok(())
}

/// 注册全部指标的说明
///
/// metrics 0.24 指标在首次使用时自动创建，未安装 recorder 时为空操作。
pub fn init_metrics() {
    metrics::describe_counter!(METRIC_RUNS_TOTAL, "Recorded action runs by status and target");
    metrics::describe_histogram!(
        METRIC_RUN_DURATION_MS,
        metrics::Unit::Milliseconds,
        "Wall-clock duration of executed runs"
    );
    metrics::describe_counter!(METRIC_RUN_TIMEOUTS, "Runs terminated by the execution timeout");
    metrics::describe_counter!(METRIC_HTTP_REQUESTS, "HTTP requests by method and status class");
    metrics::describe_histogram!(
        METRIC_HTTP_DURATION,
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    metrics::describe_gauge!(METRIC_DB_POOL_SIZE, "Open SQLite connections");
    metrics::describe_gauge!(METRIC_DB_POOL_IDLE, "Idle SQLite connections");
    tracing::debug!("Metrics initialized");
}
