//! BM25 Okapi scoring.
//!
//! Scores documents against a query using the BM25 formula with `k1` and `b`
//! from [`crate::config`].

use crate::bm25::inverted_index::InvertedIndex;
use crate::bm25::tokenizer::tokenize;
use crate::config;
use std::collections::HashMap;

/// Accumulate the BM25 score of every slot matching `query` into `scores`.
///
/// Scores from several fields can be summed by calling this once per field
/// with the same map.
pub fn accumulate_bm25(index: &InvertedIndex, query: &str, scores: &mut HashMap<u32, f32>) {
    let tokens = tokenize(query);
    if tokens.is_empty() || index.doc_count() == 0 {
        return;
    }

    let avgdl = index.average_doc_length();
    let n = index.doc_count() as f32;
    let k1 = config::BM25_K1;
    let b = config::BM25_B;

    for token in tokens.iter() {
        let Some(postings) = index.postings.get(token) else {
            continue;
        };
        let df = postings.len() as f32;
        // IDF: ln((N - df + 0.5) / (df + 0.5) + 1)
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        for (&slot, &tf) in postings {
            let dl = index.doc_length(slot) as f32;
            let tf = tf as f32;
            let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
            *scores.entry(slot).or_insert(0.0) += idf * tf_norm;
        }
    }
}

/// Sort accumulated scores descending, lower slot first on ties.
pub fn rank_scores(scores: HashMap<u32, f32>) -> Vec<(u32, f32)> {
    let mut ranked: Vec<(u32, f32)> = scores.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bm25_search(index: &InvertedIndex, query: &str) -> Vec<(u32, f32)> {
        let mut scores = HashMap::new();
        accumulate_bm25(index, query, &mut scores);
        rank_scores(scores)
    }

    fn build_corpus() -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        idx.add_document(0, "rust programming systems language fast");
        idx.add_document(1, "python programming scripting easy");
        idx.add_document(2, "java enterprise programming verbose");
        idx.add_document(3, "rust memory safety zero cost abstractions");
        idx
    }

    #[test]
    fn test_bm25_empty_query() {
        assert!(bm25_search(&build_corpus(), "").is_empty());
        assert!(bm25_search(&InvertedIndex::new(), "rust").is_empty());
    }

    #[test]
    fn test_bm25_finds_matching_docs() {
        let results = bm25_search(&build_corpus(), "rust");
        let ids: Vec<u32> = results.iter().map(|&(id, _)| id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&0) && ids.contains(&3));
    }

    #[test]
    fn test_bm25_ranking_order() {
        let mut idx = InvertedIndex::new();
        idx.add_document(0, "rust programming");
        idx.add_document(1, "rust rust rust");
        let results = bm25_search(&idx, "rust");
        assert_eq!(results[0].0, 1, "higher term frequency ranks first");
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let results = bm25_search(&build_corpus(), "programming safety");
        // "safety" occurs once, "programming" three times
        assert_eq!(results[0].0, 3);
        assert!(results.iter().all(|&(_, s)| s > 0.0));
    }

    #[test]
    fn test_ties_by_slot() {
        let mut idx = InvertedIndex::new();
        idx.add_document(7, "graph search");
        idx.add_document(2, "graph search");
        let results = bm25_search(&idx, "graph");
        assert_eq!(results[0].0, 2);
        assert_eq!(results[0].1, results[1].1);
    }

    #[test]
    fn test_accumulate_sums_fields() {
        let mut title = InvertedIndex::new();
        title.add_document(0, "vector search");
        title.add_document(1, "cooking recipes");
        let mut body = InvertedIndex::new();
        body.add_document(0, "nothing relevant");
        body.add_document(1, "vector databases");
        let mut scores = HashMap::new();
        accumulate_bm25(&title, "vector", &mut scores);
        let title_only = scores[&0];
        accumulate_bm25(&body, "vector", &mut scores);
        assert_eq!(scores[&0], title_only);
        assert!(scores[&1] > 0.0);
    }
}
