//! AlignedFrameSet - Sync Engine output
//!
//! Synchronized frame tuple and diagnostics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{DecodedFrame, RoiSnapshot, SourceIndex};

/// Synchronized frame tuple
///
/// Holds exactly one frame per configured source, in source order.
#[derive(Debug, Clone)]
pub struct AlignedFrameSet {
    /// Set sequence number (monotonically increasing)
    pub set_id: u64,

    /// One frame per source
    pub frames: Vec<Arc<DecodedFrame>>,

    /// How the tuple was produced
    pub status: SyncStatus,

    /// Last distortion score per compared pair `(0, j)`, indexed by `j - 1`
    pub distortion: Vec<Option<u64>>,
}

impl AlignedFrameSet {
    /// Whether the tuple passed the alignment check
    pub fn is_synchronized(&self) -> bool {
        !matches!(self.status, SyncStatus::Unsynchronized(_))
    }

    /// Per-source sequence numbers, in source order
    pub fn seqs(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.seq).collect()
    }
}

/// Emission status of an `AlignedFrameSet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Head frames already within the distortion threshold
    Aligned,
    /// Drift resolved this tick by discarding frames from one source
    Resynchronized {
        source: SourceIndex,
        discarded: usize,
    },
    /// Alignment skipped; frames are paired by arrival order only
    Unsynchronized(BypassReason),
}

impl SyncStatus {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Aligned => "aligned",
            SyncStatus::Resynchronized { .. } => "resynchronized",
            SyncStatus::Unsynchronized(_) => "unsynchronized",
        }
    }
}

/// Why the alignment check was bypassed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    /// At least one tracker has not locked onto a stable region yet
    RoiUnstable,
    /// A search cursor went past the configured search depth
    SearchExhausted,
    /// A ROI does not intersect its frame
    RoiOutsideFrame,
}

impl BypassReason {
    pub fn label(&self) -> &'static str {
        match self {
            BypassReason::RoiUnstable => "roi_unstable",
            BypassReason::SearchExhausted => "search_exhausted",
            BypassReason::RoiOutsideFrame => "roi_outside_frame",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Requested => write!(f, "stop requested"),
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::OpenFailed(msg) => write!(f, "open failed: {msg}"),
            StopReason::DecodeFailed(msg) => write!(f, "decode failed: {msg}"),
        }
    }
}

/// Why a capture worker stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Asked to stop by the synchronizer
    Requested,
    /// Source reported end of stream
    EndOfStream,
    /// Source could not be opened
    OpenFailed(String),
    /// Source failed while decoding
    DecodeFailed(String),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::OpenFailed(_) | StopReason::DecodeFailed(_))
    }
}

/// Per-source status (for diagnostics)
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    pub name: String,

    /// Frames currently buffered
    pub depth: usize,

    /// Frames evicted by the drop-oldest policy
    pub dropped: u64,

    /// Frames discarded by drift resolution or manual delay
    pub discarded: u64,

    /// Frames decoded so far
    pub captured: u64,

    /// Recent capture rate
    pub fps: f64,

    pub roi: RoiSnapshot,

    pub stopped: bool,

    pub stop_reason: Option<StopReason>,
}
