/// Backend policy and the exact/ANN search backends.
pub mod backend;
/// Filter predicate tree and its evaluation.
pub mod filter;
/// Oversample, widen, exact-fallback strategy for filtered vector queries.
pub mod filtered;
/// Reciprocal Rank Fusion and weighted-sum fusion of ranked lists.
pub mod hybrid;
/// OData `$filter` parser.
pub mod odata;
pub mod types;

pub use backend::{select_backend, BackendPolicy, SearchBackend};
pub use filter::FilterExpr;
pub use hybrid::{hybrid_search, FusionMethod, FusionParams, VectorRanking};
pub use odata::parse_filter;
pub use types::{
    BackendKind, FilterDiagnostics, FilterPath, FilteredOutcome, FusedResult, ScoreBreakdown,
    SearchResult, TextScore, VectorScore, VectorSearchOptions,
};
