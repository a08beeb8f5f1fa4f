//! Search: Lexical Search (§4.4), Vector Search (§4.5), Hybrid Retrieval (§4.7).

pub mod hybrid;
pub mod lexical;
mod vector;

pub use hybrid::{HybridResult, HybridSearcher};
pub use lexical::{jaccard, normalize_query, sanitize_fts5_query};
pub use vector::{
    VectorIndex, VectorIndexConfig, VectorIndexStats, VectorSearchError, VectorStore,
    DEFAULT_CONNECTIVITY, DEFAULT_DIMENSIONS,
};
