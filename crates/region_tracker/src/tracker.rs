//! RegionTracker - per-source motion region tracking

use contracts::{Rect, RoiSnapshot, TrackerConfig};
use image::RgbImage;
use metrics::{counter, gauge};
use tracing::{debug, trace};

use crate::motion::{blob_bounds, dilate, preprocess, BackgroundModel};
use crate::track::{loosely_overlaps, merge_overlapping, TrackedRegion};

const DILATE_ITERATIONS: u8 = 2;

/// Motion region tracker for a single source
///
/// Feed every decoded frame through [`RegionTracker::process`]; the returned
/// snapshot is the source's active ROI after that frame.
#[derive(Debug)]
pub struct RegionTracker {
    config: TrackerConfig,
    background: BackgroundModel,
    tracks: Vec<TrackedRegion>,
    frames_seen: u64,
    generation: u64,
    last_stable: bool,
}

impl RegionTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            background: BackgroundModel::default(),
            tracks: Vec::new(),
            frames_seen: 0,
            generation: 0,
            last_stable: false,
        }
    }

    /// Process one frame and return the active ROI.
    pub fn process(&mut self, image: &RgbImage) -> RoiSnapshot {
        let frame = preprocess(image, self.config.blur_sigma);
        let index = self.frames_seen;
        self.frames_seen += 1;

        if index > self.config.warmup_frames {
            // None right after a resolution change; the update below reseeds
            if let Some(mask) = self.background.foreground(&frame, self.config.diff_threshold) {
                let observations = blob_bounds(&dilate(&mask, DILATE_ITERATIONS));
                trace!(frame = index, observations = observations.len(), "motion observations");
                self.update_tracks(&observations);
            }
        }

        self.background.update(&frame, self.config.accumulate_weight);
        self.generation += 1;

        let roi = self.snapshot();
        if roi.stable != self.last_stable {
            debug!(
                frame = index,
                rect = %roi.rect,
                strength = roi.strength,
                stable = roi.stable,
                "active region stability changed"
            );
            self.last_stable = roi.stable;
        }
        roi
    }

    fn update_tracks(&mut self, observations: &[Rect]) {
        // Union of the observations matched to each track this frame
        let mut matched: Vec<Option<Rect>> = vec![None; self.tracks.len()];

        for obs in observations {
            let nearest = self
                .tracks
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = a.rect().centroid_distance(obs);
                    let db = b.rect().centroid_distance(obs);
                    da.total_cmp(&db)
                })
                .map(|(i, _)| i)
                .filter(|&i| loosely_overlaps(&self.tracks[i].rect(), obs));

            match nearest {
                Some(i) => {
                    matched[i] = Some(matched[i].map_or(*obs, |u| u.union(obs)));
                }
                None => {
                    self.tracks.push(TrackedRegion::new(*obs));
                    matched.push(Some(*obs));
                    counter!("region_tracker_tracks_created_total").increment(1);
                }
            }
        }

        let (high, low) = (self.config.high_threshold, self.config.low_threshold);
        let smoothing = self.config.smoothing;
        let mut kept = Vec::with_capacity(self.tracks.len());
        for (mut track, union) in self.tracks.drain(..).zip(matched) {
            match union {
                Some(union) => {
                    track.absorb(&union, smoothing);
                    track.reinforce(high);
                    kept.push(track);
                }
                None if track.strength() <= 1 => {}
                None => {
                    track.weaken(low);
                    kept.push(track);
                }
            }
        }
        self.tracks = kept;

        let merges = merge_overlapping(&mut self.tracks);
        if merges > 0 {
            trace!(merges, tracks = self.tracks.len(), "merged overlapping tracks");
        }
        gauge!("region_tracker_tracks").set(self.tracks.len() as f64);
    }

    /// Active ROI: the strongest track (first on ties), stable or not.
    pub fn snapshot(&self) -> RoiSnapshot {
        let mut best: Option<&TrackedRegion> = None;
        for track in &self.tracks {
            if best.map_or(true, |b| track.strength() > b.strength()) {
                best = Some(track);
            }
        }
        match best {
            Some(track) => RoiSnapshot {
                rect: track.rect(),
                strength: track.strength(),
                stable: track.is_stable(),
                generation: self.generation,
            },
            None => RoiSnapshot {
                generation: self.generation,
                ..RoiSnapshot::default()
            },
        }
    }

    pub fn tracks(&self) -> Vec<TrackedRegion> {
        self.tracks.clone()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Forget all tracks and the background model.
    pub fn reset(&mut self) {
        self.background.reset();
        self.tracks.clear();
        self.frames_seen = 0;
        self.last_stable = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const DARK: Rgb<u8> = Rgb([10, 10, 10]);
    const BRIGHT: Rgb<u8> = Rgb([200, 200, 200]);

    fn config(warmup_frames: u64, low: u32, high: u32) -> TrackerConfig {
        TrackerConfig {
            low_threshold: low,
            high_threshold: high,
            warmup_frames,
            blur_sigma: 0.0,
            ..TrackerConfig::default()
        }
    }

    fn frame_with_blocks(blocks: &[Rect]) -> RgbImage {
        let mut img = RgbImage::from_pixel(64, 64, DARK);
        for b in blocks {
            for y in b.y..b.bottom() {
                for x in b.x..b.right() {
                    img.put_pixel(x as u32, y as u32, BRIGHT);
                }
            }
        }
        img
    }

    #[test]
    fn test_warmup_is_inclusive() {
        let mut tracker = RegionTracker::new(config(2, 50, 250));
        let block = Rect::new(10, 10, 8, 8);

        tracker.process(&frame_with_blocks(&[]));
        for _ in 1..=2 {
            let roi = tracker.process(&frame_with_blocks(&[block]));
            assert!(roi.rect.is_empty());
        }
        assert!(tracker.tracks().is_empty());

        // frame index 3 = warmup + 1
        let roi = tracker.process(&frame_with_blocks(&[block]));
        assert_eq!(tracker.frames_seen(), 4);
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(roi.rect, Rect::new(8, 8, 12, 12));
        assert_eq!(roi.strength, 1);
        assert!(!roi.stable);
    }

    #[test]
    fn test_track_becomes_stable_then_decays() {
        let mut tracker = RegionTracker::new(config(0, 3, 5));
        let block = Rect::new(20, 20, 6, 6);

        tracker.process(&frame_with_blocks(&[]));
        for m in 1..=5 {
            let roi = tracker.process(&frame_with_blocks(&[block]));
            assert_eq!(roi.strength, m);
            assert_eq!(roi.stable, m >= 5);
        }

        let dark = frame_with_blocks(&[]);
        for _ in 0..3 {
            tracker.process(&dark);
        }
        let roi = tracker.snapshot();
        assert_eq!(roi.strength, 2);
        assert!(!roi.stable);

        tracker.process(&dark);
        let roi = tracker.process(&dark);
        assert!(tracker.tracks().is_empty());
        assert_eq!(roi.rect, Rect::EMPTY);
        assert_eq!(roi.strength, 0);
    }

    #[test]
    fn test_strongest_track_is_active() {
        let mut tracker = RegionTracker::new(config(0, 50, 250));
        let a = Rect::new(4, 4, 6, 6);
        let b = Rect::new(44, 44, 6, 6);

        tracker.process(&frame_with_blocks(&[]));
        tracker.process(&frame_with_blocks(&[a]));
        tracker.process(&frame_with_blocks(&[a]));
        let roi = tracker.process(&frame_with_blocks(&[a, b]));

        assert_eq!(tracker.tracks().len(), 2);
        assert_eq!(roi.strength, 3);
        assert_eq!(roi.rect, Rect::new(2, 2, 10, 10));
    }

    #[test]
    fn test_moving_block_keeps_one_track() {
        let mut tracker = RegionTracker::new(config(0, 50, 250));
        tracker.process(&frame_with_blocks(&[]));
        for step in 0..10 {
            tracker.process(&frame_with_blocks(&[Rect::new(10 + step, 20, 8, 8)]));
        }
        let tracks = tracker.tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].strength(), 10);
    }

    #[test]
    fn test_generation_and_reset() {
        let mut tracker = RegionTracker::new(config(0, 50, 250));
        let first = tracker.process(&frame_with_blocks(&[]));
        let second = tracker.process(&frame_with_blocks(&[Rect::new(1, 1, 4, 4)]));
        assert_eq!(second.generation, first.generation + 1);
        assert_eq!(tracker.tracks().len(), 1);

        tracker.reset();
        assert_eq!(tracker.frames_seen(), 0);
        assert!(tracker.tracks().is_empty());
        assert!(tracker.snapshot().rect.is_empty());
    }
}
