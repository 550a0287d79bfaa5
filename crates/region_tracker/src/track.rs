//! Tracked motion regions with hysteresis.

use contracts::Rect;

/// Sub-pixel corners, so exponential smoothing can accumulate below one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Corners {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Corners {
    fn from_rect(r: &Rect) -> Self {
        Self {
            x0: r.x as f64,
            y0: r.y as f64,
            x1: r.right() as f64,
            y1: r.bottom() as f64,
        }
    }

    fn to_rect(self) -> Rect {
        Rect::from_corners(
            self.x0.round() as i32,
            self.y0.round() as i32,
            self.x1.round() as i32,
            self.y1.round() as i32,
        )
    }

    fn approach(&mut self, target: &Corners, factor: f64) {
        self.x0 += (target.x0 - self.x0) * factor;
        self.y0 += (target.y0 - self.y0) * factor;
        self.x1 += (target.x1 - self.x1) * factor;
        self.y1 += (target.y1 - self.y1) * factor;
    }
}

/// A region observed over several frames
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRegion {
    corners: Corners,
    strength: u32,
    stable: bool,
}

impl TrackedRegion {
    /// New track with strength 0
    pub fn new(rect: Rect) -> Self {
        Self {
            corners: Corners::from_rect(&rect),
            strength: 0,
            stable: false,
        }
    }

    pub fn rect(&self) -> Rect {
        self.corners.to_rect()
    }

    pub fn strength(&self) -> u32 {
        self.strength
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// Matched this frame
    pub fn reinforce(&mut self, high_threshold: u32) {
        self.strength = self.strength.saturating_add(1);
        if self.strength >= high_threshold {
            self.stable = true;
        }
    }

    /// Unmatched this frame
    pub fn weaken(&mut self, low_threshold: u32) {
        self.strength = self.strength.saturating_sub(1);
        if self.strength < low_threshold {
            self.stable = false;
        }
    }

    /// Fold the union of this frame's matched observations into the track.
    ///
    /// A union larger than the track replaces it; otherwise the corners drift
    /// toward the union by `smoothing`.
    pub fn absorb(&mut self, union: &Rect, smoothing: f64) {
        if union.area() > self.rect().area() {
            self.corners = Corners::from_rect(union);
        } else {
            self.corners.approach(&Corners::from_rect(union), smoothing);
        }
    }

    fn merge_with(&mut self, other: &TrackedRegion) {
        let union = self.rect().union(&other.rect());
        if other.strength > self.strength {
            self.strength = other.strength;
            self.stable = other.stable;
        }
        self.corners = Corners::from_rect(&union);
    }
}

/// Asymmetric bounding-box proximity test.
///
/// The pair is ordered by area (larger first). The smaller rectangle's
/// extent counts double, so a blob that grew since it was last seen still
/// matches its track.
pub fn loosely_overlaps(a: &Rect, b: &Rect) -> bool {
    let (big, small) = if b.area() > a.area() { (b, a) } else { (a, b) };

    if small.x > big.right() || big.x > small.x + 2 * small.w {
        return false;
    }
    if small.y > big.bottom() || big.y > small.y + 2 * small.h {
        return false;
    }
    true
}

/// Merge overlapping tracks until a full pass makes no change.
///
/// Returns the number of merges performed.
pub fn merge_overlapping(tracks: &mut Vec<TrackedRegion>) -> usize {
    let mut merges = 0;
    loop {
        let mut merged_any = false;
        let mut i = 0;
        while i < tracks.len() {
            let mut j = i + 1;
            while j < tracks.len() {
                if loosely_overlaps(&tracks[i].rect(), &tracks[j].rect()) {
                    let other = tracks.remove(j);
                    tracks[i].merge_with(&other);
                    merges += 1;
                    merged_any = true;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !merged_any {
            return merges;
        }
    }
}
