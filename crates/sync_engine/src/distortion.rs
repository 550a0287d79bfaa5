//! Pairwise frame distortion.
//!
//! Each frame is cropped to its own source's ROI, converted to grayscale and
//! binarized. The score is the number of differing pixels at the best
//! placement of the smaller crop inside the larger one.

use contracts::{DecodedFrame, Rect};
use image::{imageops, GrayImage, Luma};

/// Binarized ROI crop, `None` when the ROI does not intersect the frame.
pub fn binarized_crop(frame: &DecodedFrame, roi: &Rect, threshold: u8) -> Option<GrayImage> {
    let rect = roi.clip_to(frame.width(), frame.height())?;
    let crop = imageops::crop_imm(
        &frame.image,
        rect.x as u32,
        rect.y as u32,
        rect.w as u32,
        rect.h as u32,
    )
    .to_image();

    let mut gray = imageops::grayscale(&crop);
    for pixel in gray.pixels_mut() {
        *pixel = Luma([if pixel[0] > threshold { 255 } else { 0 }]);
    }
    Some(gray)
}

/// Minimum pixel disagreement over every relative placement.
///
/// Offsets run over `0..=|Δw|` and `0..=|Δh|`, each applied to whichever crop
/// is larger along that axis.
pub fn distortion(a: &GrayImage, b: &GrayImage) -> u64 {
    let (aw, ah) = a.dimensions();
    let (bw, bh) = b.dimensions();
    let (w, h) = (aw.min(bw), ah.min(bh));
    if w == 0 || h == 0 {
        return 0;
    }

    let mut best = u64::MAX;
    for dy in 0..=ah.abs_diff(bh) {
        let (ay, by) = if ah >= bh { (dy, 0) } else { (0, dy) };
        for dx in 0..=aw.abs_diff(bw) {
            let (ax, bx) = if aw >= bw { (dx, 0) } else { (0, dx) };

            let mut diff = 0u64;
            'rows: for y in 0..h {
                for x in 0..w {
                    if a.get_pixel(ax + x, ay + y) != b.get_pixel(bx + x, by + y) {
                        diff += 1;
                        if diff >= best {
                            break 'rows;
                        }
                    }
                }
            }
            best = best.min(diff);
            if best == 0 {
                return 0;
            }
        }
    }
    best
}
