//! HNSW search: greedy upper-layer descent and the layer-0 beam search.
//!
//! Every search takes an `accept` predicate over labels. Rejected labels
//! (tombstoned, or failing a caller filter) are still expanded for navigation
//! but never enter the result set, so they never count toward `k`.

use crate::hnsw::distance::norm;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

thread_local! {
    /// Per-thread visited set, reused across searches so concurrent readers never share one.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::default());
}

/// Run `f` with this thread's visited set, reset for a graph of `labels` nodes.
pub(crate) fn with_visited<R>(labels: usize, f: impl FnOnce(&mut VisitedSet) -> R) -> R {
    SEARCH_VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.reset(labels);
        f(&mut visited)
    })
}

/// Heap key ordering by distance, then by label so ties resolve to insertion order.
type Key = (OrderedFloat<f32>, u32);

/// Beam search over a single layer.
///
/// Returns up to `ef` accepted nodes sorted by `(distance, label)` ascending.
/// The caller must have reset `visited` for this traversal.
#[allow(clippy::too_many_arguments)]
pub(crate) fn search_layer<F: Fn(u32) -> bool>(
    index: &HnswIndex,
    query: &[f32],
    query_norm: f32,
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
    accept: &F,
) -> Vec<(f32, u32)> {
    // Neither heap can outgrow the graph.
    let bound = index.label_count();
    let mut candidates: BinaryHeap<Reverse<Key>> =
        BinaryHeap::with_capacity(ef.saturating_mul(2).min(bound));
    let mut results: BinaryHeap<Key> = BinaryHeap::with_capacity(ef.saturating_add(1).min(bound));

    for &ep in entry_points {
        if visited.visit(ep) {
            let dist = index.distance_to(query, query_norm, ep);
            candidates.push(Reverse((OrderedFloat(dist), ep)));
            if accept(ep) {
                results.push((OrderedFloat(dist), ep));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    while let Some(Reverse((c_dist, c_label))) = candidates.pop() {
        if results.len() >= ef {
            if let Some(&(worst, _)) = results.peek() {
                if c_dist > worst {
                    break;
                }
            }
        }

        for &neighbor in index.neighbors(c_label, layer) {
            if !visited.visit(neighbor) {
                continue;
            }
            let dist = OrderedFloat(index.distance_to(query, query_norm, neighbor));
            let worst = results.peek().map(|&(d, _)| d);
            let should_add = results.len() < ef || worst.map_or(true, |w| dist < w);
            if !should_add {
                continue;
            }
            candidates.push(Reverse((dist, neighbor)));
            if accept(neighbor) {
                results.push((dist, neighbor));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|(d, label)| (d.0, label))
        .collect()
}

/// Greedy single-step descent on one layer: move to the closest neighbour until no neighbour improves.
pub(crate) fn greedy_closest(
    index: &HnswIndex,
    query: &[f32],
    query_norm: f32,
    entry: u32,
    layer: usize,
) -> u32 {
    let mut current = entry;
    let mut current_dist = index.distance_to(query, query_norm, current);
    loop {
        let mut improved = false;
        for &neighbor in index.neighbors(current, layer) {
            let dist = index.distance_to(query, query_norm, neighbor);
            if dist < current_dist || (dist == current_dist && neighbor < current) {
                current = neighbor;
                current_dist = dist;
                improved = true;
            }
        }
        if !improved {
            return current;
        }
    }
}

impl HnswIndex {
    /// Approximate k nearest live neighbours of `query`.
    ///
    /// Returns `(distance, label)` pairs sorted by ascending distance, ties by label.
    /// The layer-0 beam width is `max(ef, k)`.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<(f32, u32)> {
        self.search_where(query, k, ef, |_| true)
    }

    /// Like [`search`](Self::search), but only labels whose document passes `predicate` are returned.
    pub fn search_where<P: Fn(&str) -> bool>(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        predicate: P,
    ) -> Vec<(f32, u32)> {
        let Some(entry_point) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }
        let query_norm = norm(query);

        let mut current = entry_point;
        for layer in (1..=self.max_layer).rev() {
            current = greedy_closest(self, query, query_norm, current, layer);
        }

        let accept = |label: u32| !self.is_tombstoned(label) && predicate(self.document_id(label));
        let mut results = with_visited(self.label_count(), |visited| {
            search_layer(
                self,
                query,
                query_norm,
                std::slice::from_ref(&current),
                ef.max(k),
                0,
                visited,
                &accept,
            )
        });
        results.truncate(k);
        results
    }
}
