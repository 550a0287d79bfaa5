//! Image-sequence source: a directory of PNG/JPEG files played in lexical order.

use std::path::{Path, PathBuf};

use contracts::{ContractError, FrameSource, SourceInfo};
use image::RgbImage;
use tracing::{debug, info};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Debug)]
pub struct ImageSequenceSource {
    name: String,
    dir: PathBuf,
    fps: Option<f64>,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            fps: None,
            files: Vec::new(),
            next: 0,
        }
    }

    /// Report a nominal frame rate instead of the configured default
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn list_images(&self) -> Result<Vec<PathBuf>, ContractError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| ContractError::source_open(&self.name, e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ContractError::source_open(&self.name, e.to_string()))?
                .path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<SourceInfo, ContractError> {
        let files = self.list_images()?;
        let first = files.first().ok_or_else(|| {
            ContractError::source_open(
                &self.name,
                format!("no images in {}", self.dir.display()),
            )
        })?;
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| ContractError::source_open(&self.name, e.to_string()))?;

        info!(
            source = %self.name,
            dir = %self.dir.display(),
            frames = files.len(),
            width,
            height,
            "image sequence opened"
        );
        self.files = files;
        self.next = 0;
        Ok(SourceInfo {
            nominal_fps: self.fps,
            width,
            height,
        })
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let image = image::open(path)
            .map_err(|e| ContractError::decode(&self.name, format!("{}: {e}", path.display())))?
            .to_rgb8();
        debug!(source = %self.name, path = %path.display(), "frame decoded");
        self.next += 1;
        Ok(Some(image))
    }

    fn release(&mut self) {
        self.files.clear();
        self.next = 0;
    }
}
