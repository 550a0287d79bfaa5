//! Capture configuration and per-stream counters

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{SynchronizerConfig, TrackerConfig};

/// Capture worker configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Buffer capacity per source
    pub capacity: usize,

    /// Subtracted from the nominal frame interval
    pub pacing_correction_ms: u64,

    /// Used when the source reports no frame rate
    pub default_fps: f64,

    pub tracker: TrackerConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from(&SynchronizerConfig::default())
    }
}

impl From<&SynchronizerConfig> for CaptureConfig {
    fn from(config: &SynchronizerConfig) -> Self {
        Self {
            capacity: config.input_capacity,
            pacing_correction_ms: config.pacing_correction_ms,
            default_fps: config.default_fps,
            tracker: config.tracker.clone(),
        }
    }
}

impl CaptureConfig {
    /// Sleep between two decodes: `round(1000 / fps) - correction`, floored at zero
    pub fn frame_interval_ms(&self, nominal_fps: Option<f64>) -> u64 {
        let fps = nominal_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(self.default_fps);
        if fps <= 0.0 {
            return 0;
        }
        let interval = (1000.0 / fps).round() as u64;
        interval.saturating_sub(self.pacing_correction_ms)
    }
}

/// Stream counters
#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// Frames decoded and pushed
    pub captured: AtomicU64,

    /// Frames evicted on overflow
    pub dropped: AtomicU64,

    /// Frames discarded by alignment or manual delay
    pub discarded: AtomicU64,
}

impl StreamMetrics {
    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub captured: u64,
    pub dropped: u64,
    pub discarded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        let config = CaptureConfig::default();
        // 1000 / 25 = 40, minus 4
        assert_eq!(config.frame_interval_ms(None), 36);
        assert_eq!(config.frame_interval_ms(Some(30.0)), 29);
        assert_eq!(config.frame_interval_ms(Some(500.0)), 0);
        assert_eq!(config.frame_interval_ms(Some(f64::NAN)), 36);
    }

    #[test]
    fn test_counters() {
        let metrics = StreamMetrics::default();
        metrics.record_captured();
        metrics.record_captured();
        metrics.record_dropped();
        metrics.record_discarded(3);
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                captured: 2,
                dropped: 1,
                discarded: 3
            }
        );
    }
}
