//! FrameSource trait - video source abstraction
//!
//! Decouples capture workers from concrete decoders. Synthetic sources used by
//! tests and real decoders share the same pull-based API.

use image::RgbImage;

use crate::ContractError;

/// Properties reported by a source once opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    /// Nominal frame rate, if the source knows it
    pub nominal_fps: Option<f64>,
    pub width: u32,
    pub height: u32,
}

/// Sequential video source
///
/// Owned by exactly one capture worker; calls are never concurrent.
///
/// # Example
///
/// ```ignore
/// let mut source: Box<dyn FrameSource> = open_source("synthetic:lead=3")?;
/// let info = source.open()?;
/// while let Some(image) = source.read_frame()? {
///     // ...
/// }
/// source.release();
/// ```
pub trait FrameSource: Send {
    /// Human readable name (usually the locator)
    fn name(&self) -> &str;

    /// Open the underlying stream
    ///
    /// # Errors
    /// `ContractError::SourceOpen` when the stream cannot be opened.
    fn open(&mut self) -> Result<SourceInfo, ContractError>;

    /// Decode the next frame
    ///
    /// Returns `Ok(None)` at end of stream.
    fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError>;

    /// Release the underlying handle; idempotent
    fn release(&mut self);
}
