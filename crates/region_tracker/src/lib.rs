//! Region Tracker
//!
//! Per-source motion detection: background subtraction, blob extraction and
//! hysteresis tracking. The strongest track is exported as the source's
//! active region of interest.

pub mod motion;
pub mod track;
mod tracker;

pub use track::{loosely_overlaps, merge_overlapping, TrackedRegion};
pub use tracker::RegionTracker;
