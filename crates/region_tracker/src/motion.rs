//! Background subtraction and blob extraction.

use contracts::Rect;
use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};

/// Grayscale + Gaussian blur
pub fn preprocess(image: &RgbImage, blur_sigma: f32) -> GrayImage {
    let gray = imageops::grayscale(image);
    if blur_sigma > 0.0 {
        imageops::blur(&gray, blur_sigma)
    } else {
        gray
    }
}

/// Running-average background model
#[derive(Debug, Clone, Default)]
pub struct BackgroundModel {
    width: u32,
    height: u32,
    accum: Vec<f32>,
}

impl BackgroundModel {
    pub fn is_seeded(&self) -> bool {
        !self.accum.is_empty()
    }

    /// Accumulate `frame` with `weight`; the first frame (or a size change) seeds the model.
    pub fn update(&mut self, frame: &GrayImage, weight: f32) {
        if !self.is_seeded() || frame.dimensions() != (self.width, self.height) {
            self.width = frame.width();
            self.height = frame.height();
            self.accum = frame.as_raw().iter().map(|&p| p as f32).collect();
            return;
        }
        for (bg, &p) in self.accum.iter_mut().zip(frame.as_raw()) {
            *bg = (1.0 - weight) * *bg + weight * p as f32;
        }
    }

    /// Binary mask of pixels differing from the 8-bit background by more than `threshold`.
    ///
    /// `None` until the model is seeded with a frame of the same size.
    pub fn foreground(&self, frame: &GrayImage, threshold: u8) -> Option<GrayImage> {
        if !self.is_seeded() || frame.dimensions() != (self.width, self.height) {
            return None;
        }
        let data = self
            .accum
            .iter()
            .zip(frame.as_raw())
            .map(|(&bg, &p)| {
                let bg = bg.round().clamp(0.0, 255.0) as u8;
                if bg.abs_diff(p) > threshold {
                    255
                } else {
                    0
                }
            })
            .collect();
        GrayImage::from_raw(self.width, self.height, data)
    }

    pub fn reset(&mut self) {
        self.accum.clear();
    }
}

/// 3x3 square dilation, applied `iterations` times. Pixels outside the image are ignored.
pub fn dilate(mask: &GrayImage, iterations: u8) -> GrayImage {
    // n passes of a 3x3 square equal one chessboard-distance dilation of radius n
    morphology::dilate(mask, Norm::LInf, iterations)
}

/// Bounding boxes of 8-connected foreground blobs, in scan order.
///
/// Equivalent to the bounding boxes of external contours: holes never
/// produce a separate box.
pub fn blob_bounds(mask: &GrayImage) -> Vec<Rect> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // label -> slot in `corners`, in order of first appearance
    let mut slots: Vec<Option<usize>> = Vec::new();
    let mut corners: Vec<(u32, u32, u32, u32)> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if slots.len() <= label {
            slots.resize(label + 1, None);
        }
        match slots[label] {
            Some(slot) => {
                let (x0, y0, x1, y1) = &mut corners[slot];
                *x0 = (*x0).min(x);
                *y0 = (*y0).min(y);
                *x1 = (*x1).max(x);
                *y1 = (*y1).max(y);
            }
            None => {
                slots[label] = Some(corners.len());
                corners.push((x, y, x, y));
            }
        }
    }

    corners
        .into_iter()
        .map(|(x0, y0, x1, y1)| {
            Rect::from_corners(x0 as i32, y0 as i32, x1 as i32 + 1, y1 as i32 + 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with(w: u32, h: u32, on: &[(u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for &(x, y) in on {
            mask.put_pixel(x, y, Luma([255]));
        }
        mask
    }

    #[test]
    fn test_dilate_grows_by_one_per_iteration() {
        let mask = mask_with(9, 9, &[(4, 4)]);
        let once = dilate(&mask, 1);
        assert_eq!(blob_bounds(&once), vec![Rect::new(3, 3, 3, 3)]);
        let twice = dilate(&mask, 2);
        assert_eq!(blob_bounds(&twice), vec![Rect::new(2, 2, 5, 5)]);
    }

    #[test]
    fn test_dilate_at_border() {
        let mask = mask_with(4, 4, &[(0, 0)]);
        let out = dilate(&mask, 1);
        assert_eq!(blob_bounds(&out), vec![Rect::new(0, 0, 2, 2)]);
    }

    #[test]
    fn test_blob_bounds_diagonal_connectivity() {
        let mask = mask_with(10, 10, &[(1, 1), (2, 2), (3, 3), (8, 1)]);
        let blobs = blob_bounds(&mask);
        assert_eq!(blobs, vec![Rect::new(1, 1, 3, 3), Rect::new(8, 1, 1, 1)]);
    }

    #[test]
    fn test_blob_bounds_ring_is_single_box() {
        let mut on = Vec::new();
        for i in 2..8 {
            on.extend([(i, 2), (i, 7), (2, i), (7, i)]);
        }
        let blobs = blob_bounds(&mask_with(10, 10, &on));
        assert_eq!(blobs, vec![Rect::new(2, 2, 6, 6)]);
    }

    #[test]
    fn test_blob_bounds_separate_blobs_keep_scan_order() {
        // Second blob starts higher up but further right
        let mask = mask_with(12, 8, &[(1, 4), (1, 5), (9, 0), (9, 1), (10, 1)]);
        let blobs = blob_bounds(&mask);
        assert_eq!(blobs, vec![Rect::new(9, 0, 2, 2), Rect::new(1, 4, 1, 2)]);
    }

    #[test]
    fn test_dilate_merges_nearby_blobs() {
        let mask = mask_with(12, 6, &[(2, 2), (6, 2)]);
        assert_eq!(blob_bounds(&mask).len(), 2);
        assert_eq!(blob_bounds(&dilate(&mask, 2)), vec![Rect::new(0, 0, 9, 5)]);
    }

    #[test]
    fn test_background_seed_and_foreground() {
        let mut bg = BackgroundModel::default();
        let dark = GrayImage::from_pixel(4, 4, Luma([10]));
        assert!(bg.foreground(&dark, 25).is_none());
        bg.update(&dark, 0.01);

        let mut frame = dark.clone();
        frame.put_pixel(1, 1, Luma([200]));
        frame.put_pixel(2, 2, Luma([30]));
        let fg = bg.foreground(&frame, 25).unwrap();
        assert_eq!(fg.get_pixel(1, 1)[0], 255);
        assert_eq!(fg.get_pixel(2, 2)[0], 0);
        assert_eq!(fg.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_background_accumulates() {
        let mut bg = BackgroundModel::default();
        bg.update(&GrayImage::from_pixel(1, 1, Luma([0])), 0.5);
        bg.update(&GrayImage::from_pixel(1, 1, Luma([100])), 0.5);
        let fg = bg.foreground(&GrayImage::from_pixel(1, 1, Luma([50])), 0);
        assert_eq!(fg.unwrap().get_pixel(0, 0)[0], 0);
    }
}
