//! Capture worker: one OS thread per source.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{DecodedFrame, FrameSource, StopReason};
use observability::{metrics as obs, RateMeter};
use region_tracker::RegionTracker;
use tracing::{debug, error, info, info_span, trace, warn};

use crate::config::CaptureConfig;
use crate::error::{IngestionError, Result};
use crate::gate::StartGate;
use crate::stream::SourceStream;

/// Decodes frames from one source into its stream.
///
/// The tracker runs inline on every frame, so the stream's ROI always
/// describes the newest buffered frame.
pub struct SourceCaptureWorker {
    source: Box<dyn FrameSource>,
    stream: Arc<SourceStream>,
    tracker: RegionTracker,
    gate: Arc<StartGate>,
    config: CaptureConfig,
}

impl SourceCaptureWorker {
    pub fn new(
        source: Box<dyn FrameSource>,
        stream: Arc<SourceStream>,
        gate: Arc<StartGate>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            tracker: RegionTracker::new(config.tracker.clone()),
            source,
            stream,
            gate,
            config,
        }
    }

    /// Run on a named thread
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let source_name = self.stream.name().to_string();
        thread::Builder::new()
            .name(format!("capture-{}", self.stream.index()))
            .spawn(move || self.run())
            .map_err(|source| IngestionError::Spawn {
                source_name,
                source,
            })
    }

    /// Capture until end of stream, failure or stop request.
    pub fn run(mut self) {
        let span = info_span!(
            "capture",
            source = %self.stream.name(),
            index = self.stream.index()
        );
        let _enter = span.enter();

        // Peers must not block on a source that failed to open
        let opened = self.source.open();
        if !self.gate.wait() {
            debug!("start aborted");
            if opened.is_ok() {
                self.source.release();
            }
            self.stream.mark_stopped(StopReason::Requested);
            return;
        }

        let info = match opened {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "failed to open source");
                self.stream.mark_stopped(StopReason::OpenFailed(e.to_string()));
                return;
            }
        };

        let interval = Duration::from_millis(self.config.frame_interval_ms(info.nominal_fps));
        info!(
            width = info.width,
            height = info.height,
            nominal_fps = ?info.nominal_fps,
            interval_ms = interval.as_millis() as u64,
            "capture started"
        );

        let mut meter = RateMeter::default();
        let reason = self.capture_loop(interval, &mut meter);

        self.source.release();
        match &reason {
            StopReason::DecodeFailed(message) => error!(error = %message, "capture failed"),
            other => debug!(reason = %other, "capture loop exited"),
        }
        self.stream.mark_stopped(reason);

        let counters = self.stream.metrics();
        info!(
            captured = counters.captured,
            dropped = counters.dropped,
            average_fps = meter.average(),
            "capture stopped"
        );
    }

    fn capture_loop(&mut self, interval: Duration, meter: &mut RateMeter) -> StopReason {
        let name = self.stream.name().to_string();
        let mut seq = 0u64;

        loop {
            if self.stream.stop_requested() {
                return StopReason::Requested;
            }

            let image = match self.source.read_frame() {
                Ok(Some(image)) => image,
                Ok(None) => return StopReason::EndOfStream,
                Err(e) => return StopReason::DecodeFailed(e.to_string()),
            };

            let roi = self.tracker.process(&image);
            self.stream.publish_roi(roi);

            let frame = Arc::new(DecodedFrame::new(self.stream.index(), seq, image));
            if self.stream.push(frame) {
                warn!(seq, capacity = self.stream.capacity(), "buffer full, dropped oldest frame");
                obs::record_frames_dropped(&name, 1);
            }
            trace!(seq, depth = self.stream.len(), roi = %roi.rect, "frame captured");
            seq += 1;

            obs::record_frame_captured(&name);
            obs::record_buffer_depth(&name, self.stream.len());
            if let Some(fps) = meter.tick() {
                self.stream.set_fps(fps);
                obs::record_capture_fps(&name, fps);
                debug!(fps, "capture rate");
            }

            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
    }
}
