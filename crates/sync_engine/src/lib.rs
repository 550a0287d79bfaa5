//! # Sync Engine
//!
//! 多路视频帧同步引擎。
//!
//! 负责：
//! - 以源 0 为参考，逐对比较各源队首帧的 ROI 差异
//! - 在缓冲区内增量搜索匹配帧，丢弃漂移帧完成重同步
//! - ROI 不稳定或搜索耗尽时旁路输出（`SyncStatus::Unsynchronized`）
//! - 输出 `AlignedFrameSet`，提供调试裁剪图
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{FrameSynchronizer, SynchronizerConfig};
//!
//! let sync = FrameSynchronizer::new(SynchronizerConfig::with_sources([
//!     "synthetic",
//!     "synthetic:lead=3",
//! ]))?;
//! sync.start()?;
//!
//! if let Some(set) = sync.read() {
//!     // Handle aligned tuple
//! }
//! sync.stop();
//! sync.join();
//! ```

mod aligner;
mod distortion;
mod error;
mod fragments;
mod output;
mod synchronizer;

// Re-exports
pub use aligner::{Aligner, AlignerConfig, TickOutcome, WaitReason};
pub use distortion::{binarized_crop, distortion};
pub use error::{Result, SyncError};
pub use fragments::{DebugFragments, FRAGMENT_SLOTS};
pub use output::OutputQueue;
pub use synchronizer::FrameSynchronizer;

// Locator classification, for front ends
pub use ingestion::{source_kind, SourceKind};

// Re-export contracts types
pub use contracts::{AlignedFrameSet, BypassReason, SourceStats, SyncStatus, SynchronizerConfig};
