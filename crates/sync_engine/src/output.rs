//! Output queue with clear-on-overflow.

use std::collections::VecDeque;

use contracts::AlignedFrameSet;

/// FIFO of emitted sets.
///
/// When the queue has grown past its limit at the time of an insert, it is
/// emptied before the new set goes in.
#[derive(Debug)]
pub struct OutputQueue {
    limit: usize,
    sets: VecDeque<AlignedFrameSet>,
}

impl OutputQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            sets: VecDeque::new(),
        }
    }

    /// Append a set; returns how many stale sets were cleared first.
    pub fn push(&mut self, set: AlignedFrameSet) -> usize {
        let cleared = if self.sets.len() > self.limit {
            let n = self.sets.len();
            self.sets.clear();
            n
        } else {
            0
        };
        self.sets.push_back(set);
        cleared
    }

    pub fn pop(&mut self) -> Option<AlignedFrameSet> {
        self.sets.pop_front()
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
