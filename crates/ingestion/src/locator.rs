//! Source locator parsing
//!
//! - `synthetic` / `synthetic:width=64,height=48,fps=25,frames=100,lead=3,fail=open`
//! - `dir:<path>` or a bare filesystem path: image sequence
//! - a video file (`.mp4`, `.mov`, ...) or a stream URL (`rtsp://`, `http://`, ...):
//!   decoded with FFmpeg, needs the `video` feature

use contracts::FrameSource;

use crate::error::{IngestionError, Result};
use crate::sequence::ImageSequenceSource;
use crate::synthetic::{SyntheticConfig, SyntheticFailure, SyntheticSource};
#[cfg(feature = "video")]
use crate::video::VideoSource;

const SYNTHETIC: &str = "synthetic";
const DIR_PREFIX: &str = "dir:";

const STREAM_SCHEMES: &[&str] = &[
    "rtsp", "rtsps", "rtmp", "rtmps", "http", "https", "udp", "tcp", "srt", "file",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "avi", "mkv", "webm", "mpg", "mpeg", "ts", "flv", "wmv",
];

/// Kind of source a locator names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    ImageSequence,
    VideoFile,
    NetworkStream,
    Unsupported,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Synthetic => "synthetic",
            Self::ImageSequence => "image-sequence",
            Self::VideoFile => "video-file",
            Self::NetworkStream => "network-stream",
            Self::Unsupported => "unsupported",
        }
    }

    /// Decoded through FFmpeg
    pub fn is_video(self) -> bool {
        matches!(self, Self::VideoFile | Self::NetworkStream)
    }
}

/// Classify `locator` without opening anything.
pub fn source_kind(locator: &str) -> SourceKind {
    let locator = locator.trim();
    if locator.is_empty() {
        return SourceKind::Unsupported;
    }
    if locator == SYNTHETIC || locator.starts_with("synthetic:") {
        return SourceKind::Synthetic;
    }
    if locator.starts_with(DIR_PREFIX) {
        return SourceKind::ImageSequence;
    }
    if let Some((scheme, _)) = locator.split_once("://") {
        return if STREAM_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
            SourceKind::NetworkStream
        } else {
            SourceKind::Unsupported
        };
    }
    if locator.starts_with(SYNTHETIC) {
        return SourceKind::Unsupported;
    }

    let is_video = std::path::Path::new(locator)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if is_video {
        SourceKind::VideoFile
    } else {
        SourceKind::ImageSequence
    }
}

/// Build the frame source named by `locator`.
pub fn open_source(locator: &str) -> Result<Box<dyn FrameSource>> {
    let locator = locator.trim();

    match source_kind(locator) {
        SourceKind::Synthetic => {
            let params = locator
                .strip_prefix(SYNTHETIC)
                .and_then(|rest| rest.strip_prefix(':'))
                .unwrap_or("");
            let config = parse_synthetic(locator, params)?;
            Ok(Box::new(SyntheticSource::new(locator, config)))
        }
        SourceKind::ImageSequence => {
            let path = locator.strip_prefix(DIR_PREFIX).unwrap_or(locator);
            Ok(Box::new(ImageSequenceSource::new(locator, path)))
        }
        SourceKind::VideoFile | SourceKind::NetworkStream => open_video(locator),
        SourceKind::Unsupported => Err(IngestionError::UnsupportedLocator {
            locator: locator.to_string(),
        }),
    }
}

#[cfg(feature = "video")]
fn open_video(locator: &str) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(VideoSource::new(locator)))
}

#[cfg(not(feature = "video"))]
fn open_video(locator: &str) -> Result<Box<dyn FrameSource>> {
    Err(IngestionError::VideoDisabled {
        locator: locator.to_string(),
    })
}

fn parse_synthetic(locator: &str, params: &str) -> Result<SyntheticConfig> {
    let mut config = SyntheticConfig::default();

    for pair in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| IngestionError::invalid_parameter(locator, pair, "expected key=value"))?;
        let (key, value) = (key.trim(), value.trim());

        match key {
            "width" => config.width = parse_positive(locator, key, value)?,
            "height" => config.height = parse_positive(locator, key, value)?,
            "block" => config.block = parse_positive(locator, key, value)?,
            "fps" => {
                let fps: f64 = parse(locator, key, value)?;
                if !(fps.is_finite() && fps > 0.0) {
                    return Err(IngestionError::invalid_parameter(locator, key, "must be > 0"));
                }
                config.fps = fps;
            }
            "frames" => config.frames = Some(parse(locator, key, value)?),
            "lead" => config.lead = parse(locator, key, value)?,
            "fail" => {
                config.failure = Some(match value {
                    "open" => SyntheticFailure::Open,
                    n => SyntheticFailure::DecodeAfter(parse(locator, key, n)?),
                })
            }
            _ => {
                return Err(IngestionError::invalid_parameter(locator, key, "unknown key"));
            }
        }
    }
    Ok(config)
}

fn parse<T: std::str::FromStr>(locator: &str, key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| IngestionError::invalid_parameter(locator, key, e.to_string()))
}

fn parse_positive(locator: &str, key: &str, value: &str) -> Result<u32> {
    match parse::<u32>(locator, key, value)? {
        0 => Err(IngestionError::invalid_parameter(locator, key, "must be > 0")),
        n => Ok(n),
    }
}
