//! Synchronizer configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};

/// Frame synchronizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynchronizerConfig {
    /// Source locators, in source order; index 0 is the alignment reference
    pub sources: Vec<String>,

    /// Per-source input buffer capacity (drop-oldest beyond it)
    #[serde(default = "default_input_capacity")]
    pub input_capacity: usize,

    /// Output queue limit; the queue is cleared when it grows past this
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,

    /// Maximum distortion for two crops to count as aligned
    #[serde(default = "default_distortion_threshold")]
    pub distortion_threshold: u64,

    /// Search cursor bound before alignment is abandoned
    #[serde(default = "default_search_depth")]
    pub search_depth: usize,

    /// Binarization threshold applied to comparison crops
    #[serde(default = "default_compare_threshold")]
    pub compare_threshold: u8,

    /// Smallest matching offset treated as real drift
    #[serde(default = "default_min_shift")]
    pub min_shift: usize,

    /// Poll interval of the synchronizer loop
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Subtracted from the nominal frame interval when pacing capture
    #[serde(default = "default_pacing_correction_ms")]
    pub pacing_correction_ms: u64,

    /// Frame rate assumed when a source does not report one
    #[serde(default = "default_fps")]
    pub default_fps: f64,

    /// Region tracker configuration
    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_input_capacity() -> usize {
    128
}

fn default_output_capacity() -> usize {
    64
}

fn default_distortion_threshold() -> u64 {
    15
}

fn default_search_depth() -> usize {
    127
}

fn default_compare_threshold() -> u8 {
    150
}

fn default_min_shift() -> usize {
    3
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_pacing_correction_ms() -> u64 {
    4
}

fn default_fps() -> f64 {
    25.0
}

impl SynchronizerConfig {
    /// Default configuration for the given sources
    pub fn with_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            input_capacity: default_input_capacity(),
            output_capacity: default_output_capacity(),
            distortion_threshold: default_distortion_threshold(),
            search_depth: default_search_depth(),
            compare_threshold: default_compare_threshold(),
            min_shift: default_min_shift(),
            poll_interval_ms: default_poll_interval_ms(),
            pacing_correction_ms: default_pacing_correction_ms(),
            default_fps: default_fps(),
            tracker: TrackerConfig::default(),
        }
    }
}

/// Motion region tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Stability is lost once strength drops below this
    pub low_threshold: u32,
    /// Stability is gained once strength reaches this
    pub high_threshold: u32,
    /// Corner smoothing factor toward a smaller observation union
    pub smoothing: f64,
    /// Background accumulation weight
    pub accumulate_weight: f32,
    /// Frames (inclusive) during which detection is skipped
    pub warmup_frames: u64,
    /// Background difference binarization threshold
    pub diff_threshold: u8,
    /// Gaussian blur sigma applied before detection
    pub blur_sigma: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            low_threshold: 50,
            high_threshold: 250,
            smoothing: 0.03,
            accumulate_weight: 0.01,
            warmup_frames: 32,
            diff_threshold: 25,
            blur_sigma: 1.4,
        }
    }
}
