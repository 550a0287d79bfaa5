//! Ingestion Pipeline main entry

use std::sync::Arc;
use std::thread::JoinHandle;

use contracts::{FrameSource, SourceIndex, SourceStats, StopReason};
use tracing::{debug, error, info, instrument};

use crate::config::CaptureConfig;
use crate::error::{IngestionError, Result};
use crate::gate::StartGate;
use crate::locator::open_source;
use crate::stream::SourceStream;
use crate::worker::SourceCaptureWorker;

/// Ingestion Pipeline
///
/// Owns one stream and one capture worker per source. All workers start
/// together behind a shared [`StartGate`].
pub struct IngestionPipeline {
    config: CaptureConfig,

    /// Streams, in source order
    streams: Vec<Arc<SourceStream>>,

    /// Sources waiting for `start_all`
    pending: Vec<Box<dyn FrameSource>>,

    handles: Vec<JoinHandle<()>>,

    started: bool,
}

impl IngestionPipeline {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            streams: Vec::new(),
            pending: Vec::new(),
            handles: Vec::new(),
            started: false,
        }
    }

    /// Build a pipeline from source locators
    pub fn from_locators<S: AsRef<str>>(config: CaptureConfig, locators: &[S]) -> Result<Self> {
        let mut pipeline = Self::new(config);
        for locator in locators {
            pipeline.add_source(open_source(locator.as_ref())?)?;
        }
        Ok(pipeline)
    }

    /// Register a source; returns its index
    pub fn add_source(&mut self, source: Box<dyn FrameSource>) -> Result<SourceIndex> {
        if self.started {
            return Err(IngestionError::AlreadyStarted);
        }
        let index = self.streams.len();
        let stream = SourceStream::new(index, source.name(), self.config.capacity);
        debug!(index, source = %source.name(), "registered source");
        self.streams.push(Arc::new(stream));
        self.pending.push(source);
        Ok(index)
    }

    /// Spawn every capture worker.
    ///
    /// If a thread cannot be spawned, the start gate is aborted and the
    /// workers already spawned exit without capturing.
    #[instrument(name = "ingestion_start_all", skip(self), fields(sources = self.streams.len()))]
    pub fn start_all(&mut self) -> Result<()> {
        self.start_with(SourceCaptureWorker::spawn)
    }

    fn start_with<F>(&mut self, mut spawn: F) -> Result<()>
    where
        F: FnMut(SourceCaptureWorker) -> Result<JoinHandle<()>>,
    {
        if self.started {
            return Err(IngestionError::AlreadyStarted);
        }
        self.started = true;

        let gate = Arc::new(StartGate::new(self.pending.len()));
        info!(count = self.pending.len(), "starting capture workers");

        let sources: Vec<_> = self.pending.drain(..).collect();
        for (source, stream) in sources.into_iter().zip(&self.streams) {
            let worker =
                SourceCaptureWorker::new(source, stream.clone(), gate.clone(), self.config.clone());
            match spawn(worker) {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    error!(error = %e, "failed to start capture worker");
                    stream.mark_stopped(StopReason::OpenFailed(e.to_string()));
                    gate.abort();
                    self.stop_all();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Ask every worker to stop
    pub fn stop_all(&self) {
        for stream in &self.streams {
            stream.request_stop();
        }
    }

    /// Wait for every worker thread to exit
    pub fn join_all(&mut self) {
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("capture").to_string();
            if handle.join().is_err() {
                error!(thread = %name, "capture worker panicked");
            }
        }
    }

    /// First source that has terminated, with its reason
    pub fn first_stopped(&self) -> Option<(SourceIndex, StopReason)> {
        self.streams
            .iter()
            .find(|s| s.is_stopped())
            .map(|s| (s.index(), s.stop_reason().unwrap_or(StopReason::Requested)))
    }

    pub fn streams(&self) -> &[Arc<SourceStream>] {
        &self.streams
    }

    pub fn stream(&self, index: SourceIndex) -> Option<&Arc<SourceStream>> {
        self.streams.get(index)
    }

    pub fn source_count(&self) -> usize {
        self.streams.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn stats(&self) -> Vec<SourceStats> {
        self.streams.iter().map(|s| s.stats()).collect()
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
        self.join_all();
    }
}
