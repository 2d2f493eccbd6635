//! Epoch-stamped visited set for HNSW graph traversal.
//!
//! Each label owns one `u32` stamp; a label counts as visited when its stamp
//! equals the current epoch. Starting a new traversal bumps the epoch instead
//! of clearing the array.

#[derive(Debug, Default)]
pub struct VisitedSet {
    stamps: Vec<u32>,
    epoch: u32,
}

impl VisitedSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stamps: vec![0; capacity],
            epoch: 1,
        }
    }

    /// Begin a new traversal over a graph of `labels` nodes.
    pub fn reset(&mut self, labels: usize) {
        if labels > self.stamps.len() {
            self.stamps.resize(labels, 0);
        }
        if self.epoch == u32::MAX {
            self.stamps.fill(0);
            self.epoch = 1;
        } else {
            self.epoch += 1;
        }
    }

    /// Marks `label`; returns `true` the first time it is seen in this traversal.
    #[inline]
    pub fn visit(&mut self, label: u32) -> bool {
        let slot = &mut self.stamps[label as usize];
        if *slot == self.epoch {
            false
        } else {
            *slot = self.epoch;
            true
        }
    }
}
