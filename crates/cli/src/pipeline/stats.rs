//! Run statistics.

use std::time::Duration;

use contracts::{AlignedFrameSet, SourceStats};
use observability::SyncMetricsAggregator;

/// Statistics from one `run`
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Frame sets pulled from the synchronizer
    pub sets_pulled: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Emission rate last measured by the synchronizer
    pub sync_fps: f64,

    /// Per-source counters at shutdown
    pub sources: Vec<SourceStats>,

    /// Fault that stopped the synchronizer, if any
    pub failure: Option<String>,

    /// Status aggregation over pulled sets
    pub sync_metrics: SyncMetricsAggregator,
}

impl RunStats {
    pub fn record(&mut self, set: &AlignedFrameSet) {
        self.sets_pulled += 1;
        self.sync_metrics.update(set);
    }

    /// Pulled sets per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.sets_pulled as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Sets pulled: {}", self.sets_pulled);
        println!("Throughput: {:.2} sets/s", self.throughput());
        println!("Synchronizer FPS: {:.2}", self.sync_fps);

        println!("\nSources ({}):", self.sources.len());
        for (index, source) in self.sources.iter().enumerate() {
            println!(
                "  [{}] {}: captured={}, dropped={}, discarded={}, fps={:.2}, stop={}",
                index,
                source.name,
                source.captured,
                source.dropped,
                source.discarded,
                source.fps,
                source
                    .stop_reason
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string()),
            );
        }

        println!("\n{}", self.sync_metrics.summary());

        if let Some(ref failure) = self.failure {
            println!("Failure: {failure}");
        }
    }
}
