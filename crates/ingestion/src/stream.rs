//! Per-source bounded frame buffer and shared state.
//!
//! One capture worker pushes, the synchronizer drains. Frames are held as
//! `Arc<DecodedFrame>` so the lock is never held while pixels are read.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{DecodedFrame, RoiSnapshot, SourceIndex, SourceStats, StopReason};
use ringbuf::{traits::*, HeapRb};

use crate::config::{MetricsSnapshot, StreamMetrics};

pub type FrameRef = Arc<DecodedFrame>;

/// Shared state of one video source
pub struct SourceStream {
    index: SourceIndex,
    name: String,
    capacity: usize,
    buffer: Mutex<HeapRb<FrameRef>>,
    stop_requested: AtomicBool,
    stopped: AtomicBool,
    stop_reason: Mutex<Option<StopReason>>,
    roi: Mutex<RoiSnapshot>,
    fps_bits: AtomicU64,
    pending_delay: AtomicUsize,
    metrics: StreamMetrics,
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStream")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl SourceStream {
    pub fn new(index: SourceIndex, name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index,
            name: name.into(),
            capacity,
            buffer: Mutex::new(HeapRb::new(capacity)),
            stop_requested: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stop_reason: Mutex::new(None),
            roi: Mutex::new(RoiSnapshot::default()),
            fps_bits: AtomicU64::new(0f64.to_bits()),
            pending_delay: AtomicUsize::new(0),
            metrics: StreamMetrics::default(),
        }
    }

    #[inline]
    pub fn index(&self) -> SourceIndex {
        self.index
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn buffer(&self) -> MutexGuard<'_, HeapRb<FrameRef>> {
        // A poisoned buffer still holds valid frames
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a frame, evicting the oldest when full.
    ///
    /// Returns `true` when a frame was evicted.
    pub fn push(&self, frame: FrameRef) -> bool {
        let evicted = self.buffer().push_overwrite(frame).is_some();
        self.metrics.record_captured();
        if evicted {
            self.metrics.record_dropped();
        }
        evicted
    }

    /// Remove the oldest frame
    pub fn pop(&self) -> Option<FrameRef> {
        self.buffer().try_pop()
    }

    /// Oldest frame, without removing it
    pub fn peek(&self) -> Option<FrameRef> {
        self.buffer().try_peek().cloned()
    }

    /// Frame at `position` (0 = oldest)
    pub fn get(&self, position: usize) -> Option<FrameRef> {
        self.buffer().iter().nth(position).cloned()
    }

    /// All buffered frames, oldest first
    pub fn snapshot(&self) -> Vec<FrameRef> {
        self.buffer().iter().cloned().collect()
    }

    /// Drop up to `count` oldest frames, returning how many were dropped.
    pub fn discard(&self, count: usize) -> usize {
        let discarded = self.buffer().skip(count);
        self.metrics.record_discarded(discarded as u64);
        discarded
    }

    pub fn clear(&self) -> usize {
        self.buffer().clear()
    }

    pub fn len(&self) -> usize {
        self.buffer().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    // ===== ROI =====

    pub fn publish_roi(&self, roi: RoiSnapshot) {
        *self.roi.lock().unwrap_or_else(|e| e.into_inner()) = roi;
    }

    /// Latest published ROI
    pub fn roi(&self) -> RoiSnapshot {
        *self.roi.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ===== Frame rate =====

    pub fn set_fps(&self, fps: f64) {
        self.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }

    // ===== Manual delay =====

    /// Ask for `count` more frames to be discarded at the next tick
    pub fn request_delay(&self, count: usize) {
        self.pending_delay.fetch_add(count, Ordering::AcqRel);
    }

    pub fn pending_delay(&self) -> usize {
        self.pending_delay.load(Ordering::Acquire)
    }

    /// Discard pending delay frames; what cannot be discarded now carries over.
    pub fn apply_pending_delay(&self) -> usize {
        let wanted = self.pending_delay.swap(0, Ordering::AcqRel);
        if wanted == 0 {
            return 0;
        }
        let done = self.discard(wanted);
        if done < wanted {
            self.pending_delay.fetch_add(wanted - done, Ordering::AcqRel);
        }
        done
    }

    // ===== Lifecycle =====

    /// Ask the worker to exit at its next loop head
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Mark the stream terminated. The first reason recorded wins.
    pub fn mark_stopped(&self, reason: StopReason) {
        {
            let mut slot = self.stop_reason.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.stop_requested.store(true, Ordering::Release);
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether the worker has terminated
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn stats(&self) -> SourceStats {
        let counters = self.metrics.snapshot();
        SourceStats {
            name: self.name.clone(),
            depth: self.len(),
            dropped: counters.dropped,
            discarded: counters.discarded,
            captured: counters.captured,
            fps: self.fps(),
            roi: self.roi(),
            stopped: self.is_stopped(),
            stop_reason: self.stop_reason(),
        }
    }
}
