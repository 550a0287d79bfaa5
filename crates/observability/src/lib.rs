//! # Observability
//!
//! framesync 的日志与指标：采集线程、对齐线程和 CLI 共用同一套初始化。
//!
//! - `tracing` 订阅器：`RUST_LOG` 优先，其次为配置的默认级别
//! - 可选的 Prometheus HTTP 端点，指标名统一以 `framesync_` 开头
//! - 每个源的采集帧率与输出帧率 (`RateMeter`)
//! - 输出集合的状态计数与 distortion 统计 (`SyncMetricsAggregator`)
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig::default())?;
//!
//! while let Some(set) = synchronizer.read() {
//!     observability::record_set_emitted(&set);
//! }
//! ```

pub mod metrics;
pub mod rate;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::metrics::{
    record_buffer_depth, record_capture_fps, record_emission_fps, record_frame_captured,
    record_frames_discarded, record_frames_dropped, record_output_queue_cleared,
    record_set_emitted, MetricsSummary, RunningStats, StatsSummary, SyncMetricsAggregator,
};
pub use crate::rate::{RateMeter, DEFAULT_RATE_WINDOW};

/// Logging and metrics setup for one process
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Port of the Prometheus scrape endpoint; `None` keeps metrics in-process only
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with thread names (capture-N, synchronizer)
    Json,
    #[default]
    Pretty,
    Compact,
}

/// Install the global subscriber, then the exporter if a port is set.
///
/// Fails if a global subscriber is already installed.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));
    let registry = tracing_subscriber::registry().with(filter);

    // Capture workers and the synchronizer run on named threads
    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_thread_names(true).with_line_number(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_thread_names(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_thread_names(true))
            .try_init(),
    };
    installed.context("tracing subscriber already installed")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "logging ready"
    );
    Ok(())
}

/// Serve Prometheus metrics on `0.0.0.0:port` without touching logging.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("cannot serve metrics on port {port}"))?;

    tracing::info!(port, "metrics endpoint listening");
    Ok(())
}
