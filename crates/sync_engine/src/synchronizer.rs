//! FrameSynchronizer - threaded handle around the aligner

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{
    AlignedFrameSet, ContractError, FrameSource, SourceIndex, SourceStats, SynchronizerConfig,
};
use ingestion::{CaptureConfig, IngestionPipeline, SourceStream};
use observability::{metrics as obs, RateMeter};
use tracing::{debug, error, info, instrument, warn};

use crate::aligner::{Aligner, AlignerConfig, TickOutcome};
use crate::error::{Result, SyncError};
use crate::fragments::DebugFragments;
use crate::output::OutputQueue;

/// State shared between the handle and the synchronizer thread
#[derive(Debug)]
struct Shared {
    output: Mutex<OutputQueue>,
    stop_requested: AtomicBool,
    stopped: AtomicBool,
    failure: Mutex<Option<String>>,
    fps_bits: AtomicU64,
    fragments: Arc<DebugFragments>,
}

impl Shared {
    fn output(&self) -> MutexGuard<'_, OutputQueue> {
        self.output.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_failure(&self, message: String) {
        let mut slot = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(message);
        }
    }
}

/// Multi-source frame synchronizer
///
/// Owns one capture worker per source plus the synchronizer thread. Consumers
/// pull aligned tuples with [`FrameSynchronizer::read`].
///
/// ```ignore
/// let sync = FrameSynchronizer::new(SynchronizerConfig::with_sources([
///     "synthetic", "synthetic:lead=3",
/// ]))?;
/// sync.start()?;
/// while !sync.is_stopped() {
///     if let Some(set) = sync.read() {
///         // ...
///     }
/// }
/// ```
pub struct FrameSynchronizer {
    config: SynchronizerConfig,
    shared: Arc<Shared>,
    streams: Vec<Arc<SourceStream>>,
    pipeline: Mutex<Option<IngestionPipeline>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FrameSynchronizer {
    /// Open every configured source locator
    pub fn new(config: SynchronizerConfig) -> Result<Self> {
        let pipeline = IngestionPipeline::from_locators(CaptureConfig::from(&config), &config.sources)?;
        Self::from_pipeline(config, pipeline)
    }

    /// Use already constructed sources instead of `config.sources`
    pub fn with_sources(
        config: SynchronizerConfig,
        sources: Vec<Box<dyn FrameSource>>,
    ) -> Result<Self> {
        let mut pipeline = IngestionPipeline::new(CaptureConfig::from(&config));
        for source in sources {
            pipeline.add_source(source)?;
        }
        Self::from_pipeline(config, pipeline)
    }

    fn from_pipeline(config: SynchronizerConfig, pipeline: IngestionPipeline) -> Result<Self> {
        if pipeline.source_count() < 2 {
            return Err(SyncError::NotEnoughSources {
                count: pipeline.source_count(),
            });
        }

        let shared = Arc::new(Shared {
            output: Mutex::new(OutputQueue::new(config.output_capacity)),
            stop_requested: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            failure: Mutex::new(None),
            fps_bits: AtomicU64::new(0f64.to_bits()),
            fragments: Arc::new(DebugFragments::new()),
        });

        Ok(Self {
            streams: pipeline.streams().to_vec(),
            config,
            shared,
            pipeline: Mutex::new(Some(pipeline)),
            handle: Mutex::new(None),
        })
    }

    /// Start capture workers and the synchronizer thread.
    #[instrument(name = "synchronizer_start", skip(self), fields(sources = self.streams.len()))]
    pub fn start(&self) -> Result<()> {
        let mut pipeline = self.take_pipeline().ok_or(SyncError::AlreadyStarted)?;

        if let Err(e) = pipeline.start_all() {
            self.shared.set_failure(e.to_string());
            self.shared.stopped.store(true, Ordering::Release);
            return Err(e.into());
        }

        let shared = self.shared.clone();
        let config = self.config.clone();
        let handle = thread::Builder::new()
            .name("synchronizer".to_string())
            .spawn(move || run_loop(pipeline, shared, config))
            .map_err(|e| {
                self.shared.stopped.store(true, Ordering::Release);
                SyncError::Spawn(e)
            })?;

        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!(
            sources = self.streams.len(),
            output_capacity = self.config.output_capacity,
            "synchronizer started"
        );
        Ok(())
    }

    /// Ask everything to stop; returns immediately.
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        // Never started: release the sources here
        if let Some(pipeline) = self.take_pipeline() {
            drop(pipeline);
            self.shared.output().clear();
            self.shared.stopped.store(true, Ordering::Release);
        }
    }

    fn take_pipeline(&self) -> Option<IngestionPipeline> {
        self.pipeline
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Whether the pipeline has been fully released
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Wait for the synchronizer thread (and with it every worker) to exit
    pub fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("synchronizer thread panicked");
                self.shared.set_failure("synchronizer thread panicked".to_string());
                self.shared.stopped.store(true, Ordering::Release);
            }
        }
    }

    /// Next aligned tuple, if any
    pub fn read(&self) -> Option<AlignedFrameSet> {
        self.shared.output().pop()
    }

    /// Discard `frame_count` more frames of a source at the next tick
    pub fn delay(&self, source: SourceIndex, frame_count: usize) -> Result<()> {
        let stream = self
            .streams
            .get(source)
            .ok_or(ContractError::InvalidSourceIndex {
                index: source,
                count: self.streams.len(),
            })?;
        stream.request_delay(frame_count);
        info!(source = %stream.name(), frame_count, "manual delay requested");
        Ok(())
    }

    /// Measured emission rate
    pub fn fps(&self) -> f64 {
        f64::from_bits(self.shared.fps_bits.load(Ordering::Relaxed))
    }

    /// PNG of the latest comparison crop for `slot`, once per write
    pub fn debug_fragment(&self, slot: usize) -> Option<Vec<u8>> {
        match self.shared.fragments.take_png(slot) {
            Ok(png) => png,
            Err(e) => {
                warn!(slot, error = %e, "failed to encode debug fragment");
                None
            }
        }
    }

    /// Why the pipeline stopped, if it was a fault
    pub fn failure(&self) -> Option<String> {
        self.shared
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn source_stats(&self) -> Vec<SourceStats> {
        self.streams.iter().map(|s| s.stats()).collect()
    }

    pub fn source_count(&self) -> usize {
        self.streams.len()
    }

    pub fn config(&self) -> &SynchronizerConfig {
        &self.config
    }
}

impl Drop for FrameSynchronizer {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

fn run_loop(mut pipeline: IngestionPipeline, shared: Arc<Shared>, config: SynchronizerConfig) {
    let streams = pipeline.streams().to_vec();
    let mut aligner = Aligner::new(
        AlignerConfig::from(&config),
        streams.len(),
        shared.fragments.clone(),
    );
    let mut meter = RateMeter::default();
    let poll = Duration::from_millis(config.poll_interval_ms);

    loop {
        if shared.stop_requested.load(Ordering::Acquire) {
            info!("stop requested");
            break;
        }

        if let Some((index, reason)) = pipeline.first_stopped() {
            let name = streams[index].name();
            if reason.is_failure() {
                error!(source = %name, reason = %reason, "source failed, stopping all sources");
                shared.set_failure(format!("source {name}: {reason}"));
            } else {
                info!(source = %name, reason = %reason, "source stopped, stopping all sources");
            }
            break;
        }

        match aligner.tick(&streams) {
            Ok(TickOutcome::Emitted(set)) => {
                obs::record_set_emitted(&set);
                let cleared = shared.output().push(set);
                if cleared > 0 {
                    warn!(cleared, "output queue over capacity, cleared");
                    obs::record_output_queue_cleared(cleared);
                }
                if let Some(fps) = meter.tick() {
                    shared.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
                    obs::record_emission_fps(fps);
                    debug!(fps, "emission rate");
                }
            }
            Ok(TickOutcome::Waiting(_)) => thread::sleep(poll),
            Err(e) => {
                error!(error = %e, "synchronizer tick failed");
                shared.set_failure(e.to_string());
                break;
            }
        }
    }

    pipeline.stop_all();
    pipeline.join_all();
    shared.output().clear();
    shared.stopped.store(true, Ordering::Release);

    info!(
        sets = aligner.sets_emitted(),
        average_fps = meter.average(),
        "synchronizer stopped"
    );
}
