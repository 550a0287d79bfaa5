//! Per-tick alignment of N source buffers.
//!
//! Source 0 is the reference; every other source `j` forms the pair `(0, j)`.
//! A tick either emits exactly one tuple or reports why it is waiting.

use std::sync::Arc;

use contracts::{
    AlignedFrameSet, BypassReason, RoiSnapshot, SourceIndex, SyncStatus, SynchronizerConfig,
};
use image::GrayImage;
use ingestion::{FrameRef, SourceStream};
use observability::metrics as obs;
use tracing::{debug, info, instrument, trace, warn};

use crate::distortion::{binarized_crop, distortion};
use crate::error::{Result, SyncError};
use crate::fragments::DebugFragments;

/// Alignment parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignerConfig {
    pub distortion_threshold: u64,
    pub search_depth: usize,
    pub compare_threshold: u8,
    pub min_shift: usize,
}

impl From<&SynchronizerConfig> for AlignerConfig {
    fn from(config: &SynchronizerConfig) -> Self {
        Self {
            distortion_threshold: config.distortion_threshold,
            search_depth: config.search_depth,
            compare_threshold: config.compare_threshold,
            min_shift: config.min_shift,
        }
    }
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self::from(&SynchronizerConfig::default())
    }
}

/// Result of one tick
#[derive(Debug)]
pub enum TickOutcome {
    Emitted(AlignedFrameSet),
    Waiting(WaitReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// At least one buffer has no frame
    EmptyBuffer,
    /// Drift detected but no matching frame buffered yet
    Unresolved,
}

/// Alignment state of one `(0, j)` pair
#[derive(Debug, Clone, Default)]
struct PairState {
    /// Head sequence numbers the distortion was computed for
    heads: Option<(u64, u64)>,
    distortion: Option<u64>,
    ref_cursor: usize,
    other_cursor: usize,
}

impl PairState {
    /// Record a new score and restart the search. An unscored pair keeps no
    /// heads, so the next tick crops it again.
    fn rescored(&mut self, heads: (u64, u64), distortion: Option<u64>) {
        *self = Self {
            heads: distortion.map(|_| heads),
            distortion,
            ..Self::default()
        };
    }

    fn exhausted(&self, depth: usize) -> bool {
        self.ref_cursor > depth || self.other_cursor > depth
    }
}

#[derive(Debug)]
pub struct Aligner {
    config: AlignerConfig,
    pairs: Vec<PairState>,
    next_set_id: u64,
    fragments: Arc<DebugFragments>,
    last_bypass: Option<BypassReason>,
}

impl Aligner {
    pub fn new(config: AlignerConfig, sources: usize, fragments: Arc<DebugFragments>) -> Self {
        Self {
            config,
            pairs: vec![PairState::default(); sources.saturating_sub(1)],
            next_set_id: 0,
            fragments,
            last_bypass: None,
        }
    }

    /// Run one alignment step over `streams` (source order, reference first).
    #[instrument(level = "trace", name = "aligner_tick", skip_all)]
    pub fn tick(&mut self, streams: &[Arc<SourceStream>]) -> Result<TickOutcome> {
        for stream in streams {
            let applied = stream.apply_pending_delay();
            if applied > 0 {
                info!(
                    source = %stream.name(),
                    discarded = applied,
                    pending = stream.pending_delay(),
                    "manual delay applied"
                );
                obs::record_frames_discarded(stream.name(), "delay", applied as u64);
            }
        }

        if streams.iter().any(|s| s.is_empty()) {
            return Ok(TickOutcome::Waiting(WaitReason::EmptyBuffer));
        }

        let rois: Vec<RoiSnapshot> = streams.iter().map(|s| s.roi()).collect();
        if rois.iter().any(|roi| !roi.is_usable()) {
            return self.bypass(streams, BypassReason::RoiUnstable);
        }
        if self
            .pairs
            .iter()
            .any(|p| p.exhausted(self.config.search_depth))
        {
            return self.bypass(streams, BypassReason::SearchExhausted);
        }

        let heads = heads(streams)?;
        let Some(ref_crop) = self.crop(&heads[0], &rois[0]) else {
            return self.bypass(streams, BypassReason::RoiOutsideFrame);
        };

        for j in 1..streams.len() {
            let key = (heads[0].seq, heads[j].seq);
            if self.pairs[j - 1].heads == Some(key) {
                continue;
            }
            let Some(crop) = self.crop(&heads[j], &rois[j]) else {
                return self.bypass(streams, BypassReason::RoiOutsideFrame);
            };
            let score = distortion(&ref_crop, &crop);
            self.fragments.write(0, ref_crop.clone());
            self.fragments.write(j, crop);
            self.pairs[j - 1].rescored(key, Some(score));

            if score > self.config.distortion_threshold {
                debug!(
                    pair = j,
                    ref_seq = key.0,
                    other_seq = key.1,
                    distortion = score,
                    "pair misaligned"
                );
            }
        }

        if self.pairs.iter().all(|p| self.within_threshold(p)) {
            return self.emit(streams, SyncStatus::Aligned);
        }

        for j in 1..streams.len() {
            if self.within_threshold(&self.pairs[j - 1]) {
                continue;
            }
            if let Some((source, offset)) = self.search(streams, &rois, j, &ref_crop, &heads[j]) {
                let discarded = if offset >= self.config.min_shift {
                    let n = streams[source].discard(offset);
                    obs::record_frames_discarded(streams[source].name(), "shift", n as u64);
                    n
                } else {
                    0
                };
                debug!(
                    pair = j,
                    source,
                    offset,
                    discarded,
                    "drift resolved"
                );
                self.rescore(streams, &rois)?;
                return self.emit(streams, SyncStatus::Resynchronized { source, discarded });
            }
        }

        trace!(
            cursors = ?self.pairs.iter().map(|p| (p.ref_cursor, p.other_cursor)).collect::<Vec<_>>(),
            "drift unresolved"
        );
        Ok(TickOutcome::Waiting(WaitReason::Unresolved))
    }

    /// Search both buffers of pair `(0, j)` for a frame matching the other head.
    ///
    /// Returns the source to shift and the matching position.
    fn search(
        &mut self,
        streams: &[Arc<SourceStream>],
        rois: &[RoiSnapshot],
        j: SourceIndex,
        ref_crop: &GrayImage,
        other_head: &FrameRef,
    ) -> Option<(SourceIndex, usize)> {
        let config = self.config;
        let pair = &mut self.pairs[j - 1];

        let others = streams[j].snapshot();
        if let Some(k) = scan(&others, &mut pair.other_cursor, ref_crop, &rois[j], &config) {
            return Some((j, k));
        }

        let other_crop = binarized_crop(other_head, &rois[j].rect, config.compare_threshold)?;
        let references = streams[0].snapshot();
        scan(
            &references,
            &mut pair.ref_cursor,
            &other_crop,
            &rois[0],
            &config,
        )
        .map(|k| (0, k))
    }

    /// Recompute every pair against the current heads.
    fn rescore(&mut self, streams: &[Arc<SourceStream>], rois: &[RoiSnapshot]) -> Result<()> {
        let heads = heads(streams)?;
        let ref_crop = self.crop(&heads[0], &rois[0]);
        for j in 1..streams.len() {
            let key = (heads[0].seq, heads[j].seq);
            let score = match (&ref_crop, self.crop(&heads[j], &rois[j])) {
                (Some(a), Some(b)) => {
                    let score = distortion(a, &b);
                    self.fragments.write(j, b);
                    Some(score)
                }
                _ => None,
            };
            self.pairs[j - 1].rescored(key, score);
        }
        if let Some(crop) = ref_crop {
            self.fragments.write(0, crop);
        }
        Ok(())
    }

    fn bypass(
        &mut self,
        streams: &[Arc<SourceStream>],
        reason: BypassReason,
    ) -> Result<TickOutcome> {
        if self.last_bypass != Some(reason) {
            warn!(reason = reason.label(), "alignment bypassed");
        } else {
            trace!(reason = reason.label(), "alignment bypassed");
        }
        self.last_bypass = Some(reason);
        let outcome = self.emit(streams, SyncStatus::Unsynchronized(reason))?;
        // Bypassed heads are gone: every pair starts a fresh search
        for pair in &mut self.pairs {
            *pair = PairState::default();
        }
        Ok(outcome)
    }

    fn emit(&mut self, streams: &[Arc<SourceStream>], status: SyncStatus) -> Result<TickOutcome> {
        let mut frames = Vec::with_capacity(streams.len());
        for (index, stream) in streams.iter().enumerate() {
            frames.push(stream.pop().ok_or(SyncError::BufferUnderrun { index })?);
        }
        if !matches!(status, SyncStatus::Unsynchronized(_)) {
            self.last_bypass = None;
        }

        let set = AlignedFrameSet {
            set_id: self.next_set_id,
            frames,
            status,
            distortion: self.pairs.iter().map(|p| p.distortion).collect(),
        };
        self.next_set_id += 1;
        trace!(set_id = set.set_id, seqs = ?set.seqs(), status = status.label(), "set emitted");
        Ok(TickOutcome::Emitted(set))
    }

    fn crop(&self, frame: &FrameRef, roi: &RoiSnapshot) -> Option<GrayImage> {
        binarized_crop(frame, &roi.rect, self.config.compare_threshold)
    }

    fn within_threshold(&self, pair: &PairState) -> bool {
        pair.distortion
            .is_some_and(|d| d <= self.config.distortion_threshold)
    }

    /// `(ref_cursor, other_cursor)` of pair `(0, other)`
    pub fn cursors(&self, other: SourceIndex) -> Option<(usize, usize)> {
        let pair = self.pairs.get(other.checked_sub(1)?)?;
        Some((pair.ref_cursor, pair.other_cursor))
    }

    /// Last distortion of pair `(0, other)`
    pub fn distortion(&self, other: SourceIndex) -> Option<u64> {
        self.pairs.get(other.checked_sub(1)?)?.distortion
    }

    pub fn sets_emitted(&self) -> u64 {
        self.next_set_id
    }
}

fn heads(streams: &[Arc<SourceStream>]) -> Result<Vec<FrameRef>> {
    streams
        .iter()
        .enumerate()
        .map(|(index, s)| s.peek().ok_or(SyncError::BufferUnderrun { index }))
        .collect()
}

/// Examine `frames[cursor + 1..]` against `target`, advancing `cursor`.
///
/// Stops at the first match, or once the cursor passes the search depth.
fn scan(
    frames: &[FrameRef],
    cursor: &mut usize,
    target: &GrayImage,
    roi: &RoiSnapshot,
    config: &AlignerConfig,
) -> Option<usize> {
    for k in (*cursor + 1)..frames.len() {
        *cursor = k;
        if k > config.search_depth {
            return None;
        }
        let Some(crop) = binarized_crop(&frames[k], &roi.rect, config.compare_threshold) else {
            continue;
        };
        if distortion(target, &crop) <= config.distortion_threshold {
            return Some(k);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DecodedFrame, Rect};
    use ingestion::{SyntheticConfig, SyntheticSource};

    const FULL: Rect = Rect {
        x: 0,
        y: 0,
        w: 64,
        h: 48,
    };

    /// Stream holding synthetic content `ts`, with a fixed stable ROI
    fn stream(index: SourceIndex, ts: impl IntoIterator<Item = u64>) -> Arc<SourceStream> {
        let stream = Arc::new(SourceStream::new(index, format!("s{index}"), 128));
        stream.publish_roi(RoiSnapshot::fixed(FULL));
        push(&stream, ts);
        stream
    }

    fn push(stream: &SourceStream, ts: impl IntoIterator<Item = u64>) {
        let config = SyntheticConfig::default();
        for t in ts {
            let seq = stream.metrics().captured;
            let image = SyntheticSource::render(&config, t);
            stream.push(Arc::new(DecodedFrame::new(stream.index(), seq, image)));
        }
    }

    fn aligner(sources: usize, config: AlignerConfig) -> Aligner {
        Aligner::new(config, sources, Arc::new(DebugFragments::new()))
    }

    fn emitted(outcome: TickOutcome) -> AlignedFrameSet {
        match outcome {
            TickOutcome::Emitted(set) => set,
            other => panic!("expected emission, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_behind_by_three() {
        let streams = vec![stream(0, 0..10), stream(1, 3..13)];
        let fragments = Arc::new(DebugFragments::new());
        let mut aligner = Aligner::new(AlignerConfig::default(), 2, fragments.clone());

        let set = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            set.status,
            SyncStatus::Resynchronized {
                source: 0,
                discarded: 3
            }
        );
        assert_eq!(set.seqs(), vec![3, 0]);
        assert_eq!(set.distortion, vec![Some(0)]);
        assert_eq!(streams[0].metrics().discarded, 3);
        assert!(fragments.take(0).is_some());
        assert!(fragments.take(1).is_some());

        for _ in 0..3 {
            let set = emitted(aligner.tick(&streams).unwrap());
            assert_eq!(set.status, SyncStatus::Aligned);
            assert_eq!(set.distortion, vec![Some(0)]);
        }
        assert_eq!(streams[0].metrics().discarded, 3);
        assert_eq!(streams[1].metrics().discarded, 0);
    }

    #[test]
    fn test_other_behind_by_three() {
        let streams = vec![stream(0, 3..13), stream(1, 0..10)];
        let mut aligner = aligner(2, AlignerConfig::default());

        let set = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            set.status,
            SyncStatus::Resynchronized {
                source: 1,
                discarded: 3
            }
        );
        assert_eq!(set.seqs(), vec![0, 3]);
        assert_eq!(aligner.distortion(1), Some(0));
    }

    #[test]
    fn test_small_offsets_are_not_discarded() {
        for lead in 1..=2u64 {
            let streams = vec![stream(0, 0..10), stream(1, lead..10 + lead)];
            let mut aligner = aligner(2, AlignerConfig::default());

            let set = emitted(aligner.tick(&streams).unwrap());
            assert_eq!(
                set.status,
                SyncStatus::Resynchronized {
                    source: 0,
                    discarded: 0
                }
            );
            assert_eq!(set.seqs(), vec![0, 0]);
            assert!(set.distortion[0].unwrap() > 15);
            assert_eq!(streams[0].len(), 9);
            assert_eq!(streams[1].len(), 9);
        }
    }

    #[test]
    fn test_search_resumes_from_cursor() {
        let streams = vec![stream(0, 0..3), stream(1, 5..8)];
        let mut aligner = aligner(2, AlignerConfig::default());

        assert!(matches!(
            aligner.tick(&streams).unwrap(),
            TickOutcome::Waiting(WaitReason::Unresolved)
        ));
        assert_eq!(aligner.cursors(1), Some((2, 2)));

        push(&streams[0], 3..6);
        let set = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            set.status,
            SyncStatus::Resynchronized {
                source: 0,
                discarded: 5
            }
        );
        assert_eq!(set.seqs(), vec![5, 0]);
    }

    #[test]
    fn test_bypass_after_search_depth() {
        let streams = vec![stream(0, 0..10), stream(1, 20..30)];
        let config = AlignerConfig {
            search_depth: 4,
            ..Default::default()
        };
        let mut aligner = aligner(2, config);

        assert!(matches!(
            aligner.tick(&streams).unwrap(),
            TickOutcome::Waiting(WaitReason::Unresolved)
        ));
        assert_eq!(aligner.cursors(1), Some((5, 5)));

        let set = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            set.status,
            SyncStatus::Unsynchronized(BypassReason::SearchExhausted)
        );
        assert_eq!(set.seqs(), vec![0, 0]);

        // New heads reset the search
        assert!(matches!(
            aligner.tick(&streams).unwrap(),
            TickOutcome::Waiting(WaitReason::Unresolved)
        ));
    }

    #[test]
    fn test_search_restarts_after_exhaustion() {
        // Shared content only shows up two frames in
        let streams = vec![
            stream(0, [0, 1, 50, 51, 52, 53]),
            stream(1, [20, 21, 50, 51, 52, 53]),
        ];
        let config = AlignerConfig {
            search_depth: 1,
            ..Default::default()
        };
        let mut aligner = aligner(2, config);

        let mut statuses = Vec::new();
        let mut aligned = Vec::new();
        for _ in 0..6 {
            if let TickOutcome::Emitted(set) = aligner.tick(&streams).unwrap() {
                statuses.push(set.status);
                if set.status == SyncStatus::Aligned {
                    aligned.push(set);
                }
            }
        }

        assert_eq!(
            statuses[..2],
            [
                SyncStatus::Unsynchronized(BypassReason::SearchExhausted),
                SyncStatus::Unsynchronized(BypassReason::SearchExhausted),
            ]
        );
        assert!(aligned.len() >= 2);
        assert_eq!(aligned[0].seqs(), vec![2, 2]);
        assert_eq!(aligned[0].distortion, vec![Some(0)]);
        assert_eq!(aligned[1].seqs(), vec![3, 3]);
    }

    #[test]
    fn test_bypass_resets_cursors() {
        let streams = vec![stream(0, 0..10), stream(1, 20..30)];
        let config = AlignerConfig {
            search_depth: 2,
            ..Default::default()
        };
        let mut aligner = aligner(2, config);

        aligner.tick(&streams).unwrap();
        assert_eq!(aligner.cursors(1), Some((3, 3)));
        emitted(aligner.tick(&streams).unwrap());
        assert_eq!(aligner.cursors(1), Some((0, 0)));
    }

    #[test]
    fn test_unscored_pair_is_cropped_again() {
        let streams = vec![stream(0, 0..4), stream(1, 0..4)];
        let mut aligner = aligner(2, AlignerConfig::default());

        streams[1].publish_roi(RoiSnapshot::fixed(Rect::new(500, 500, 10, 10)));
        let rois: Vec<RoiSnapshot> = streams.iter().map(|s| s.roi()).collect();
        aligner.rescore(&streams, &rois).unwrap();
        assert_eq!(aligner.pairs[0].heads, None);
        assert_eq!(aligner.distortion(1), None);

        let set = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            set.status,
            SyncStatus::Unsynchronized(BypassReason::RoiOutsideFrame)
        );
    }

    #[test]
    fn test_bypass_while_roi_unstable() {
        let streams = vec![stream(0, 0..4), stream(1, 3..7)];
        streams[1].publish_roi(RoiSnapshot::default());
        let mut aligner = aligner(2, AlignerConfig::default());

        let set = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            set.status,
            SyncStatus::Unsynchronized(BypassReason::RoiUnstable)
        );
        assert!(!set.is_synchronized());
        assert_eq!(set.seqs(), vec![0, 0]);
        assert_eq!(streams[0].len(), 3);
    }

    #[test]
    fn test_bypass_when_roi_outside_frame() {
        let streams = vec![stream(0, 0..2), stream(1, 0..2)];
        streams[0].publish_roi(RoiSnapshot::fixed(Rect::new(500, 500, 10, 10)));
        let mut aligner = aligner(2, AlignerConfig::default());

        let set = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            set.status,
            SyncStatus::Unsynchronized(BypassReason::RoiOutsideFrame)
        );
    }

    #[test]
    fn test_waits_on_empty_buffer() {
        let streams = vec![stream(0, 0..3), stream(1, std::iter::empty())];
        let mut aligner = aligner(2, AlignerConfig::default());
        assert!(matches!(
            aligner.tick(&streams).unwrap(),
            TickOutcome::Waiting(WaitReason::EmptyBuffer)
        ));
        assert_eq!(streams[0].len(), 3);
        assert_eq!(aligner.sets_emitted(), 0);
    }

    #[test]
    fn test_manual_delay_applied_first() {
        let streams = vec![stream(0, 0..8), stream(1, 3..11)];
        streams[0].request_delay(3);
        let mut aligner = aligner(2, AlignerConfig::default());

        let set = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(set.status, SyncStatus::Aligned);
        assert_eq!(set.seqs(), vec![3, 0]);
        assert_eq!(streams[0].metrics().discarded, 3);
    }

    #[test]
    fn test_manual_delay_carries_over() {
        let streams = vec![stream(0, 0..1), stream(1, 0..4)];
        streams[0].request_delay(3);
        let mut aligner = aligner(2, AlignerConfig::default());

        assert!(matches!(
            aligner.tick(&streams).unwrap(),
            TickOutcome::Waiting(WaitReason::EmptyBuffer)
        ));
        assert_eq!(streams[0].pending_delay(), 2);
    }

    #[test]
    fn test_three_sources_converge() {
        let streams = vec![stream(0, 0..12), stream(1, 0..12), stream(2, 3..15)];
        let mut aligner = aligner(3, AlignerConfig::default());

        let first = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            first.status,
            SyncStatus::Resynchronized {
                source: 0,
                discarded: 3
            }
        );

        let second = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(
            second.status,
            SyncStatus::Resynchronized {
                source: 1,
                discarded: 3
            }
        );

        let third = emitted(aligner.tick(&streams).unwrap());
        assert_eq!(third.status, SyncStatus::Aligned);
        assert_eq!(third.distortion, vec![Some(0), Some(0)]);
        assert_eq!(third.set_id, 2);
    }
}
