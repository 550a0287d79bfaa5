//! # Ingestion Pipeline
//!
//! Video frame ingestion module.
//!
//! Responsibilities:
//! - Open frame sources from locators (synthetic, image sequence, and with
//!   the `video` feature video files and network streams)
//! - One capture worker thread per source, started together behind a start gate
//! - Run the source's region tracker inline and publish its ROI
//! - Bounded per-source buffers with a drop-oldest policy
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{CaptureConfig, IngestionPipeline};
//!
//! let mut pipeline = IngestionPipeline::from_locators(
//!     CaptureConfig::default(),
//!     &["synthetic", "synthetic:lead=3"],
//! )?;
//! pipeline.start_all()?;
//!
//! let visual = pipeline.stream(0).unwrap();
//! while let Some(frame) = visual.pop() {
//!     // ...
//! }
//! ```

mod config;
mod error;
mod gate;
mod locator;
mod pipeline;
mod sequence;
mod stream;
mod synthetic;
#[cfg(feature = "video")]
mod video;
mod worker;

// Re-exports
pub use config::{CaptureConfig, MetricsSnapshot, StreamMetrics};
pub use error::{IngestionError, Result};
pub use gate::StartGate;
pub use locator::{open_source, source_kind, SourceKind};
pub use pipeline::IngestionPipeline;
pub use sequence::ImageSequenceSource;
pub use stream::{FrameRef, SourceStream};
pub use synthetic::{SyntheticConfig, SyntheticFailure, SyntheticSource};
#[cfg(feature = "video")]
pub use video::VideoSource;
pub use worker::SourceCaptureWorker;
