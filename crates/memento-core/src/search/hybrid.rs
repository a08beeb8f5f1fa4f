//! Hybrid Retrieval (spec §4.7): orchestrates lexical + vector, normalizes,
//! fuses, and delegates the composed candidates to the Ranking Core.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::embeddings::ProviderChain;
use crate::error::Result;
use crate::model::{Filter, Memory};
use crate::ranking::{self, Features, RankingWeights, RelevanceWeights, ScoredCandidate};
use crate::search::lexical::normalize_query;
use crate::search::vector::VectorStore;
use crate::storage::SqliteStorage;

/// Result of a hybrid search: the ranked items plus whether the vector
/// branch was skipped due to its sub-deadline (spec §5 — "degraded").
pub struct HybridResult {
    pub items: Vec<ScoredCandidate>,
    pub degraded: bool,
}

pub struct HybridSearcher {
    storage: Arc<SqliteStorage>,
    providers: Arc<ProviderChain>,
    vector_store: Option<Arc<VectorStore>>,
    ranking_weights: RankingWeights,
    relevance_weights: RelevanceWeights,
    search_timeout: Duration,
}

impl HybridSearcher {
    pub fn new(
        storage: Arc<SqliteStorage>,
        providers: Arc<ProviderChain>,
        vector_store: Option<Arc<VectorStore>>,
        ranking_weights: RankingWeights,
        relevance_weights: RelevanceWeights,
        search_timeout: Duration,
    ) -> Self {
        HybridSearcher {
            storage,
            providers,
            vector_store,
            ranking_weights,
            relevance_weights,
            search_timeout,
        }
    }

    /// Runs the full pipeline: normalize, lexical + vector in parallel
    /// (vector bounded by the overall search deadline), union, score, and
    /// return the top `limit` (spec §4.7). When no vector store is attached
    /// (feature disabled, or index never built) the vector branch simply
    /// contributes nothing — a graceful downgrade, not a failure.
    pub async fn search(&self, query: &str, filter: &Filter, limit: usize) -> Result<HybridResult> {
        let query_tokens = normalize_query(query);
        let fetch_limit = (2 * limit).max(limit) as i64;

        let storage = self.storage.clone();
        let query_owned = query.to_string();
        let filter_owned = filter.clone();
        let lexical_task = tokio::task::spawn_blocking(move || {
            storage.lexical_search(&query_owned, &filter_owned, fetch_limit)
        });

        let mut degraded = false;
        let query_vector = if query.trim().is_empty() {
            None
        } else {
            self.providers.embed(query).await.ok()
        };

        let vector_hits: HashMap<String, f64> = match (&self.vector_store, &query_vector) {
            (Some(store), Some(vector)) => {
                let store = store.clone();
                let vector = vector.clone();
                let fetch_limit = fetch_limit as usize;
                let vector_task =
                    tokio::task::spawn_blocking(move || store.search(&vector, fetch_limit));
                match tokio::time::timeout(self.search_timeout, vector_task).await {
                    Ok(Ok(scored)) => scored
                        .into_iter()
                        .map(|(id, score)| (id, score as f64))
                        .collect(),
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "vector search task panicked");
                        HashMap::new()
                    }
                    Err(_) => {
                        degraded = true;
                        HashMap::new()
                    }
                }
            }
            _ => HashMap::new(),
        };

        let lexical_rows = lexical_task
            .await
            .map_err(|e| crate::error::Error::internal(e.to_string()))??;

        let mut bm25_by_id: HashMap<String, f64> = HashMap::new();
        let mut memories: HashMap<String, Memory> = HashMap::new();
        for row in lexical_rows {
            if let Some(bm25) = row.bm25 {
                bm25_by_id.insert(row.memory.id.clone(), bm25);
            }
            memories.insert(row.memory.id.clone(), row.memory);
        }

        // Vector hits can surface ids the lexical scan never returned (it is
        // filtered and capacity-bounded independently). Every such id still
        // has to pass the caller's filter before it becomes a candidate —
        // the vector branch carries no predicate of its own.
        for id in vector_hits.keys() {
            if !memories.contains_key(id) {
                if let Ok(memory) = self.storage.get(id) {
                    if filter.matches(&memory) {
                        memories.insert(id.clone(), memory);
                    }
                }
            }
        }

        let now = chrono::Utc::now();
        let mut scored: Vec<(Memory, Features)> = Vec::with_capacity(memories.len());
        for (id, memory) in memories {
            let cosine = vector_hits.get(&id).copied();
            let bm25 = bm25_by_id.get(&id).copied();
            let relevance =
                ranking::relevance(cosine, bm25, &query_tokens, &memory, self.relevance_weights);
            let features = Features {
                relevance,
                recency: ranking::recency(&memory, now),
                importance: ranking::importance(&memory),
                usage: ranking::usage(&memory),
                duplication: 0.0,
            };
            scored.push((memory, features));
        }

        let items = ranking::select_top_k(scored, &self.ranking_weights, limit);
        Ok(HybridResult { items, degraded })
    }
}
