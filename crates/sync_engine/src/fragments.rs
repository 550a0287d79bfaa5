//! Debug fragments: the latest comparison crop per slot.
//!
//! Each slot is guarded on its own. A read takes the crop out, so every write
//! is observed at most once.

use std::io::Cursor;
use std::sync::Mutex;

use contracts::ContractError;
use image::{imageops, GrayImage, ImageFormat};

pub const FRAGMENT_SLOTS: usize = 8;

const SCALE: u32 = 2;

#[derive(Debug, Default)]
pub struct DebugFragments {
    slots: [Mutex<Option<GrayImage>>; FRAGMENT_SLOTS],
}

impl DebugFragments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a slot; out-of-range slots are ignored.
    pub fn write(&self, slot: usize, crop: GrayImage) {
        if let Some(cell) = self.slots.get(slot) {
            *cell.lock().unwrap_or_else(|e| e.into_inner()) = Some(crop);
        }
    }

    /// Take the crop of a slot, leaving it empty.
    pub fn take(&self, slot: usize) -> Option<GrayImage> {
        self.slots
            .get(slot)?
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Take a slot and encode it as PNG at twice its size.
    pub fn take_png(&self, slot: usize) -> Result<Option<Vec<u8>>, ContractError> {
        self.take(slot).map(|crop| encode_png(&crop)).transpose()
    }
}

fn encode_png(crop: &GrayImage) -> Result<Vec<u8>, ContractError> {
    let scaled = imageops::resize(
        crop,
        crop.width() * SCALE,
        crop.height() * SCALE,
        imageops::FilterType::Nearest,
    );
    let mut bytes = Vec::new();
    scaled
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| ContractError::Encode {
            message: e.to_string(),
        })?;
    Ok(bytes)
}
