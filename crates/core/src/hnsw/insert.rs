//! HNSW insertion with bidirectional edges and heuristic neighbour pruning
//! (Algorithm 4 from the HNSW paper).

use crate::hnsw::distance::norm;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::search::{greedy_closest, search_layer, with_visited};
use std::collections::HashSet;

impl HnswIndex {
    /// Insert `vector` for `document_id` and return the fresh label it was given.
    ///
    /// A document that is already present keeps its old node as a tombstone.
    /// The caller is responsible for dimension and finiteness checks.
    pub fn insert(&mut self, document_id: &str, vector: &[f32]) -> u32 {
        let level = self.random_level();
        let previous_entry = self.entry_point;
        let label = self.push_node(document_id, vector, level);

        let Some(entry_point) = previous_entry else {
            self.entry_point = Some(label);
            self.max_layer = level;
            return label;
        };

        let query_norm = norm(vector);

        // Phase 1: greedy descent through layers above the new node's level
        let mut current = entry_point;
        for layer in (level + 1..=self.max_layer).rev() {
            current = greedy_closest(self, vector, query_norm, current, layer);
        }

        // Phase 2: beam search each shared layer and pick diverse neighbours
        let top = level.min(self.max_layer);
        let mut layer_eps = vec![current];
        for layer in (0..=top).rev() {
            let candidates = with_visited(self.label_count(), |visited| {
                search_layer(
                    self,
                    vector,
                    query_norm,
                    &layer_eps,
                    self.config.ef_construction,
                    layer,
                    visited,
                    &|l: u32| l != label,
                )
            });
            let selected = select_neighbors_heuristic(self, &candidates, self.max_links(layer));
            self.neighbors[label as usize][layer] = selected.iter().map(|&(_, l)| l).collect();

            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, l)| l));
            if layer_eps.is_empty() {
                layer_eps.push(entry_point);
            }
        }

        // Phase 3: back-links, pruning any neighbour pushed over capacity
        for layer in 0..=top {
            let m_max = self.max_links(layer);
            let mine = self.neighbors[label as usize][layer].clone();
            for neighbor in mine {
                let list = &mut self.neighbors[neighbor as usize][layer];
                list.push(label);
                if list.len() <= m_max {
                    continue;
                }
                let candidates: Vec<(f32, u32)> = self.neighbors[neighbor as usize][layer]
                    .iter()
                    .map(|&c| (self.distance_between(neighbor, c), c))
                    .collect();
                let pruned = select_neighbors_heuristic(self, &candidates, m_max);
                self.neighbors[neighbor as usize][layer] = pruned.iter().map(|&(_, l)| l).collect();
            }
        }

        // The newest node on the top layer becomes the entry point
        if level >= self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(label);
        }
        label
    }

    #[inline]
    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }
}

/// Diversity-preferring neighbour selection.
///
/// A candidate is kept only if it is at least as close to the base node as to
/// every neighbour already kept. Slots left empty are filled with the closest
/// discarded candidates so well-clustered data still gets `m` links.
pub(crate) fn select_neighbors_heuristic(
    index: &HnswIndex,
    candidates: &[(f32, u32)],
    m: usize,
) -> Vec<(f32, u32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    for &(dist_to_base, cid) in &sorted {
        if selected.len() >= m {
            break;
        }
        let is_diverse = selected
            .iter()
            .all(|&(_, sid)| dist_to_base <= index.distance_between(cid, sid));
        if is_diverse {
            selected.push((dist_to_base, cid));
        }
    }

    if selected.len() < m {
        let taken: HashSet<u32> = selected.iter().map(|&(_, l)| l).collect();
        for &(dist, cid) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !taken.contains(&cid) {
                selected.push((dist, cid));
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::distance::DistanceMetric;
    use crate::hnsw::graph::HnswConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::VecDeque;

    fn build_random(n: usize, dim: usize, config: HnswConfig) -> HnswIndex {
        let mut rng = StdRng::seed_from_u64(77);
        let mut idx = HnswIndex::with_seed(dim, config, 1);
        for i in 0..n {
            let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            idx.insert(&format!("d{i}"), &v);
        }
        idx
    }

    #[test]
    fn test_first_insert_becomes_entry_point() {
        let mut idx = HnswIndex::with_seed(2, HnswConfig::default(), 0);
        let label = idx.insert("a", &[1.0, 0.0]);
        assert_eq!(label, 0);
        assert_eq!(idx.entry_point(), Some(0));
        assert_eq!(idx.max_layer(), idx.level(0));
    }

    #[test]
    fn test_degree_bounds() {
        let config = HnswConfig::new(4, 40, 40, DistanceMetric::Cosine);
        let idx = build_random(300, 8, config);
        for label in 0..idx.label_count() as u32 {
            for layer in 0..=idx.level(label) {
                let cap = if layer == 0 { 8 } else { 4 };
                assert!(idx.neighbors(label, layer).len() <= cap);
                assert!(!idx.neighbors(label, layer).contains(&label), "self-loop");
            }
        }
    }

    #[test]
    fn test_all_nodes_reachable_from_entry_point() {
        let idx = build_random(500, 8, HnswConfig::new(8, 100, 50, DistanceMetric::Cosine));
        let ep = idx.entry_point().unwrap();
        let mut seen = vec![false; idx.label_count()];
        let mut queue = VecDeque::from([ep]);
        seen[ep as usize] = true;
        while let Some(l) = queue.pop_front() {
            for &n in idx.neighbors(l, 0) {
                if !seen[n as usize] {
                    seen[n as usize] = true;
                    queue.push_back(n);
                }
            }
        }
        // back-link pruning can in principle orphan a node; it must stay exceptional
        let reachable = seen.iter().filter(|&&s| s).count();
        assert!(
            reachable * 100 >= idx.label_count() * 99,
            "only {reachable}/{} nodes reachable from the entry point",
            idx.label_count()
        );
    }

    #[test]
    fn test_entry_point_on_max_layer() {
        let idx = build_random(400, 4, HnswConfig::default());
        let ep = idx.entry_point().unwrap();
        assert_eq!(idx.level(ep), idx.max_layer());
        // entry point is the latest node holding the top level
        let latest = (0..idx.label_count() as u32)
            .filter(|&l| idx.level(l) == idx.max_layer())
            .max()
            .unwrap();
        assert_eq!(ep, latest);
    }

    #[test]
    fn test_reinsert_tombstones_old_label() {
        let mut idx = HnswIndex::with_seed(2, HnswConfig::default(), 0);
        idx.insert("a", &[1.0, 0.0]);
        idx.insert("b", &[0.0, 1.0]);
        let fresh = idx.insert("a", &[0.0, 1.0]);
        assert_eq!(fresh, 2);
        assert!(idx.is_tombstoned(0));
        let results = idx.search(&[1.0, 0.0], 3, 10);
        let ids: Vec<&str> = results.iter().map(|&(_, l)| idx.document_id(l)).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a") && ids.contains(&"b"));
    }

    #[test]
    fn test_heuristic_prefers_diverse_neighbors() {
        let mut idx = HnswIndex::with_seed(2, HnswConfig::new(4, 10, 10, DistanceMetric::Euclidean), 0);
        idx.push_node("base", &[0.0, 0.0], 0);
        idx.push_node("near", &[1.0, 0.0], 0);
        idx.push_node("clone", &[1.1, 0.0], 0);
        idx.push_node("other", &[0.0, 1.2], 0);
        let candidates: Vec<(f32, u32)> = (1..4).map(|l| (idx.distance_between(0, l), l)).collect();
        let picked = select_neighbors_heuristic(&idx, &candidates, 2);
        let labels: Vec<u32> = picked.iter().map(|&(_, l)| l).collect();
        assert_eq!(labels, vec![1, 3], "the clone is shadowed by its closer twin");

        let filled = select_neighbors_heuristic(&idx, &candidates, 3);
        assert_eq!(filled.len(), 3);
        assert_eq!(filled[2].1, 2);
    }
}
