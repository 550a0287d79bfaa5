//! Frame synchronizer 指标收集模块
//!
//! 记录采集、缓冲、对齐三个阶段的运行指标，并在内存中聚合运行摘要。

use std::collections::HashMap;

use contracts::{AlignedFrameSet, SyncStatus};
use metrics::{counter, gauge, histogram};

/// 记录一组对齐帧的输出
///
/// 每次同步器产生 AlignedFrameSet 时调用。
pub fn record_set_emitted(set: &AlignedFrameSet) {
    match set.status {
        SyncStatus::Unsynchronized(reason) => {
            counter!(
                "framesync_sets_emitted_total",
                "status" => set.status.label(),
                "reason" => reason.label()
            )
            .increment(1);
        }
        _ => {
            counter!("framesync_sets_emitted_total", "status" => set.status.label()).increment(1);
        }
    }

    gauge!("framesync_last_set_id").set(set.set_id as f64);

    for (pair, score) in set.distortion.iter().enumerate() {
        if let Some(score) = score {
            histogram!("framesync_distortion", "pair" => format!("0-{}", pair + 1))
                .record(*score as f64);
        }
    }
}

/// 记录采集到的帧
pub fn record_frame_captured(source: &str) {
    counter!("framesync_frames_captured_total", "source" => source.to_string()).increment(1);
}

/// 记录缓冲区溢出丢弃的帧
pub fn record_frames_dropped(source: &str, count: u64) {
    counter!("framesync_frames_dropped_total", "source" => source.to_string()).increment(count);
}

/// 记录对齐或手动延迟丢弃的帧
///
/// `cause` 为 `"shift"` 或 `"delay"`。
pub fn record_frames_discarded(source: &str, cause: &'static str, count: u64) {
    counter!(
        "framesync_frames_discarded_total",
        "source" => source.to_string(),
        "cause" => cause
    )
    .increment(count);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(source: &str, depth: usize) {
    gauge!("framesync_buffer_depth", "source" => source.to_string()).set(depth as f64);
}

/// 记录采集帧率
pub fn record_capture_fps(source: &str, fps: f64) {
    gauge!("framesync_capture_fps", "source" => source.to_string()).set(fps);
}

/// 记录输出帧率
pub fn record_emission_fps(fps: f64) {
    gauge!("framesync_emission_fps").set(fps);
}

/// 记录输出队列被清空
pub fn record_output_queue_cleared(discarded: usize) {
    counter!("framesync_output_queue_clears_total").increment(1);
    counter!("framesync_output_sets_discarded_total").increment(discarded as u64);
}

/// 同步指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// 输出总组数
    pub total_sets: u64,

    pub aligned: u64,

    pub resynchronized: u64,

    pub unsynchronized: u64,

    /// 对齐时丢弃的帧数
    pub total_discarded: u64,

    /// 距离分数统计
    pub distortion_stats: RunningStats,

    /// 各源对齐丢帧数
    pub discard_counts: HashMap<usize, u64>,

    /// 各旁路原因次数
    pub bypass_counts: HashMap<String, u64>,
}

impl SyncMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, set: &AlignedFrameSet) {
        self.total_sets += 1;

        match set.status {
            SyncStatus::Aligned => self.aligned += 1,
            SyncStatus::Resynchronized { source, discarded } => {
                self.resynchronized += 1;
                self.total_discarded += discarded as u64;
                *self.discard_counts.entry(source).or_insert(0) += discarded as u64;
            }
            SyncStatus::Unsynchronized(reason) => {
                self.unsynchronized += 1;
                *self
                    .bypass_counts
                    .entry(reason.label().to_string())
                    .or_insert(0) += 1;
            }
        }

        for score in set.distortion.iter().flatten() {
            self.distortion_stats.push(*score as f64);
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_sets: self.total_sets,
            aligned: self.aligned,
            resynchronized: self.resynchronized,
            unsynchronized: self.unsynchronized,
            total_discarded: self.total_discarded,
            sync_rate: if self.total_sets > 0 {
                (self.aligned + self.resynchronized) as f64 / self.total_sets as f64 * 100.0
            } else {
                0.0
            },
            distortion: StatsSummary::from(&self.distortion_stats),
            bypass_counts: self.bypass_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_sets: u64,
    pub aligned: u64,
    pub resynchronized: u64,
    pub unsynchronized: u64,
    pub total_discarded: u64,
    pub sync_rate: f64,
    pub distortion: StatsSummary,
    pub bypass_counts: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sync Metrics Summary ===")?;
        writeln!(f, "Total sets: {}", self.total_sets)?;
        writeln!(
            f,
            "Synchronized: {} ({:.2}%)",
            self.aligned + self.resynchronized,
            self.sync_rate
        )?;
        writeln!(f, "  aligned: {}", self.aligned)?;
        writeln!(f, "  resynchronized: {}", self.resynchronized)?;
        writeln!(f, "Unsynchronized: {}", self.unsynchronized)?;
        writeln!(f, "Frames discarded by shift: {}", self.total_discarded)?;
        writeln!(f, "Distortion: {}", self.distortion)?;

        if !self.bypass_counts.is_empty() {
            writeln!(f, "Bypass reasons:")?;
            let mut reasons: Vec<_> = self.bypass_counts.iter().collect();
            reasons.sort();
            for (reason, count) in reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use contracts::{BypassReason, DecodedFrame};
    use image::RgbImage;

    fn set(set_id: u64, status: SyncStatus, distortion: Option<u64>) -> AlignedFrameSet {
        let frames = (0..2)
            .map(|s| Arc::new(DecodedFrame::new(s, set_id, RgbImage::new(2, 2))))
            .collect();
        AlignedFrameSet {
            set_id,
            frames,
            status,
            distortion: vec![distortion],
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-10);
        assert!((stats.min() - 2.0).abs() < 1e-10);
        assert!((stats.max() - 9.0).abs() < 1e-10);
        assert!((stats.variance() - 32.0 / 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts_statuses() {
        let mut aggregator = SyncMetricsAggregator::new();
        aggregator.update(&set(0, SyncStatus::Aligned, Some(3)));
        aggregator.update(&set(
            1,
            SyncStatus::Resynchronized {
                source: 1,
                discarded: 4,
            },
            Some(0),
        ));
        aggregator.update(&set(
            2,
            SyncStatus::Unsynchronized(BypassReason::RoiUnstable),
            None,
        ));

        assert_eq!(aggregator.total_sets, 3);
        assert_eq!(aggregator.aligned, 1);
        assert_eq!(aggregator.resynchronized, 1);
        assert_eq!(aggregator.unsynchronized, 1);
        assert_eq!(aggregator.total_discarded, 4);
        assert_eq!(aggregator.discard_counts.get(&1), Some(&4));
        assert_eq!(aggregator.bypass_counts.get("roi_unstable"), Some(&1));
        assert_eq!(aggregator.distortion_stats.count(), 2);

        let summary = aggregator.summary();
        assert!((summary.sync_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = SyncMetricsAggregator::new();
        for i in 0..4 {
            aggregator.update(&set(i, SyncStatus::Aligned, Some(i)));
        }
        aggregator.update(&set(
            4,
            SyncStatus::Unsynchronized(BypassReason::SearchExhausted),
            None,
        ));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total sets: 5"));
        assert!(output.contains("80.00%"));
        assert!(output.contains("search_exhausted: 1"));
    }
}
