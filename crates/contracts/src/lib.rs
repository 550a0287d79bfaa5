//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Frame Model
//! - Each source numbers its frames with a strictly increasing `seq`
//! - Arrival time is a monotonic `Instant`, used for diagnostics only
//! - Alignment works at whole-frame granularity

mod error;
mod frame;
mod frame_source;
mod geometry;
mod roi;
mod sync;
mod synchronizer_config;

pub use error::*;
pub use frame::*;
pub use frame_source::{FrameSource, SourceInfo};
pub use geometry::Rect;
pub use roi::RoiSnapshot;
pub use sync::*;
pub use synchronizer_config::*;
