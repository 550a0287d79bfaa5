//! Runner - drives a `FrameSynchronizer` from the async runtime.
//!
//! The synchronizer itself is thread based; the runner only polls its pull API
//! and owns shutdown (limit, timeout, signal, or the synchronizer stopping).

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::SynchronizerConfig;
use sync_engine::{FrameSynchronizer, FRAGMENT_SLOTS};
use tracing::{debug, info, trace, warn};

use super::RunStats;

/// Run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Synchronizer configuration (sources included)
    pub sync: SynchronizerConfig,

    /// Maximum number of sets to pull (None = unlimited)
    pub max_sets: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Manual delays applied right after start, as `(source, frames)`
    pub delays: Vec<(usize, usize)>,

    /// Where to write the last comparison crops
    pub fragments_dir: Option<PathBuf>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Why pulling ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullEnd {
    Limit,
    Stopped,
}

pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Run until the set limit, the timeout, `shutdown`, or the synchronizer stops.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let sync = Arc::new(
            FrameSynchronizer::new(self.config.sync.clone())
                .context("Failed to open sources")?,
        );
        info!(sources = sync.source_count(), "Sources opened");

        sync.start().context("Failed to start synchronizer")?;
        for &(source, frames) in &self.config.delays {
            sync.delay(source, frames)
                .with_context(|| format!("Invalid delay for source {source}"))?;
        }

        let mut stats = RunStats::default();
        let poll = Duration::from_millis(self.config.sync.poll_interval_ms.max(1));
        let pull = pull_sets(&sync, &mut stats, self.config.max_sets, poll);

        tokio::select! {
            end = with_timeout(self.config.timeout, pull) => match end {
                Some(PullEnd::Limit) => info!("Reached max sets limit"),
                Some(PullEnd::Stopped) => info!("Synchronizer stopped"),
                None => warn!(timeout = ?self.config.timeout, "Run timed out"),
            },
            _ = shutdown => {
                warn!("Received shutdown signal, stopping synchronizer...");
            }
        }

        info!("Shutting down synchronizer...");
        let handle = sync.clone();
        tokio::task::spawn_blocking(move || {
            handle.stop();
            handle.join();
        })
        .await
        .context("Shutdown task failed")?;

        if let Some(ref dir) = self.config.fragments_dir {
            write_fragments(&sync, dir)?;
        }

        stats.duration = start_time.elapsed();
        stats.sync_fps = sync.fps();
        stats.sources = sync.source_stats();
        stats.failure = sync.failure();

        info!(
            sets = stats.sets_pulled,
            duration_secs = stats.duration.as_secs_f64(),
            throughput = stats.throughput(),
            "Run complete"
        );

        Ok(stats)
    }
}

async fn with_timeout<F: Future>(timeout: Option<Duration>, fut: F) -> Option<F::Output> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

async fn pull_sets(
    sync: &FrameSynchronizer,
    stats: &mut RunStats,
    max_sets: Option<u64>,
    poll: Duration,
) -> PullEnd {
    loop {
        match sync.read() {
            Some(set) => {
                trace!(set_id = set.set_id, seqs = ?set.seqs(), "Set pulled");
                if !set.is_synchronized() {
                    debug!(set_id = set.set_id, status = set.status.label(), "Unsynchronized set");
                }
                stats.record(&set);

                if max_sets.is_some_and(|max| stats.sets_pulled >= max) {
                    return PullEnd::Limit;
                }
            }
            None if sync.is_stopped() => return PullEnd::Stopped,
            None => tokio::time::sleep(poll).await,
        }
    }
}

/// Write `fragment_<slot>.png` for every slot holding a crop
fn write_fragments(sync: &FrameSynchronizer, dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = 0;
    for slot in 0..sync.source_count().min(FRAGMENT_SLOTS) {
        if let Some(png) = sync.debug_fragment(slot) {
            let path = dir.join(format!("fragment_{slot}.png"));
            std::fs::write(&path, png)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written += 1;
        }
    }
    info!(dir = %dir.display(), written, "Debug fragments written");
    Ok(())
}
