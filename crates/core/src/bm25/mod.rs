//! BM25 full-text ranking: tokenizer, per-field inverted index and Okapi scorer.

pub mod inverted_index;
pub mod scorer;
pub mod tokenizer;

pub use inverted_index::InvertedIndex;
pub use scorer::{accumulate_bm25, rank_scores};
