//! RoiSnapshot - RegionTracker output
//!
//! Immutable view of a source's active region of interest.

use serde::{Deserialize, Serialize};

use crate::Rect;

/// Active ROI published by a tracker
///
/// A copy is handed out on every read, so holders never observe a rectangle
/// being rewritten underneath them. `generation` increases by one per tracker tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiSnapshot {
    pub rect: Rect,
    pub strength: u32,
    pub stable: bool,
    pub generation: u64,
}

impl RoiSnapshot {
    /// A stable ROI that never changes (fixed watch box, tests)
    pub fn fixed(rect: Rect) -> Self {
        Self {
            rect,
            strength: u32::MAX,
            stable: true,
            generation: 0,
        }
    }

    /// Whether the synchronizer may trust this ROI for alignment
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.stable && !self.rect.is_empty()
    }
}
