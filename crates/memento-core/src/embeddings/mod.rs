//! Embedding Providers (spec §4.2) and Embedding Cache (spec §4.3).
//!
//! A [`ProviderChain`] tries hosted-primary, then hosted-secondary, then the
//! always-available local hashing provider, returning the first success. An
//! [`EmbeddingCache`] sits in front of the chain so repeated queries skip
//! re-embedding entirely.

mod cache;
mod hosted;
mod local;

pub use cache::EmbeddingCache;
pub use local::{cosine_similarity, dot_product, euclidean_distance, CorpusStats, LOCAL_DIMENSIONS};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ProviderChoice};
use crate::error::Result;
use crate::storage::SqliteStorage;

/// A source of embedding vectors. Hosted providers call out over HTTP; the
/// local provider never fails and never leaves the process.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn dimension(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

struct LocalProvider {
    dimension: usize,
    storage: Option<Arc<SqliteStorage>>,
}

impl LocalProvider {
    /// Builds the [`CorpusStats`] the IDF half of [`local::embed`] needs,
    /// from whatever document-frequency counts `storage` has recorded for
    /// `text`'s own tokens. No storage (isolated unit tests, or a chain built
    /// without persistence) degrades to [`CorpusStats::default`], which makes
    /// the IDF term neutral rather than erroring.
    fn corpus_stats(&self, text: &str) -> CorpusStats {
        let Some(storage) = &self.storage else {
            return CorpusStats::default();
        };
        let tokens = crate::search::lexical::normalize_query(text);
        let total_docs = storage.total_doc_count().unwrap_or(0);
        let doc_frequency = storage.doc_frequencies(&tokens).unwrap_or_default();
        CorpusStats::new(total_docs, doc_frequency)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let corpus = self.corpus_stats(text);
        Ok(local::embed(text, &corpus))
    }
}

/// Hosted-primary → hosted-secondary → local-lightweight fallback chain
/// (spec §4.2). Each provider is tried in order, bounded by the configured
/// embedding timeout; the local provider is always appended last and never
/// fails, so `embed` only returns an error if every hosted provider and the
/// timeout itself are somehow all exhausted (it is not — this is the
/// invariant the chain exists to guarantee).
pub struct ProviderChain {
    providers: Vec<Box<dyn EmbeddingProvider>>,
    timeout: Duration,
    cache: Arc<EmbeddingCache>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn EmbeddingProvider>>, timeout: Duration, cache: Arc<EmbeddingCache>) -> Self {
        ProviderChain {
            providers,
            timeout,
            cache,
        }
    }

    /// Builds the chain implied by `config.embedding_provider`: the selected
    /// provider first, any other configured hosted provider second, and the
    /// local provider always last. `storage`, when given, lets the local
    /// provider's IDF term draw on real corpus document-frequency counts
    /// instead of the neutral default.
    pub fn from_config(config: &Config, storage: Option<Arc<SqliteStorage>>) -> Self {
        let mut providers: Vec<Box<dyn EmbeddingProvider>> = Vec::new();

        let primary_endpoint = config.hosted_primary_endpoint.clone();
        let secondary_endpoint = config.hosted_secondary_endpoint.clone();
        let primary_key = config.hosted_primary_api_key.clone();
        let secondary_key = config.hosted_secondary_api_key.clone();

        match config.embedding_provider {
            ProviderChoice::HostedPrimary => {
                if let Some(endpoint) = primary_endpoint.clone() {
                    providers.push(hosted::hosted_primary(endpoint, primary_key.clone(), config.embedding_dimensions));
                }
                if let Some(endpoint) = secondary_endpoint.clone() {
                    providers.push(hosted::hosted_secondary(endpoint, secondary_key.clone(), config.embedding_dimensions));
                }
            }
            ProviderChoice::HostedSecondary => {
                if let Some(endpoint) = secondary_endpoint.clone() {
                    providers.push(hosted::hosted_secondary(endpoint, secondary_key.clone(), config.embedding_dimensions));
                }
                if let Some(endpoint) = primary_endpoint.clone() {
                    providers.push(hosted::hosted_primary(endpoint, primary_key.clone(), config.embedding_dimensions));
                }
            }
            ProviderChoice::Local => {}
        }

        providers.push(Box::new(LocalProvider {
            dimension: LOCAL_DIMENSIONS,
            storage,
        }));

        let cache = Arc::new(EmbeddingCache::new(
            config.cache_max_size,
            Duration::from_millis(config.cache_ttl_ms),
        ));

        ProviderChain::new(
            providers,
            Duration::from_millis(config.embedding_timeout_ms),
            cache,
        )
    }

    /// Embeds `text`, trying each provider in order and falling through to
    /// the next on error or timeout. Serves from the cache when present.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached);
        }

        let mut last_err = None;
        for provider in &self.providers {
            let attempt = tokio::time::timeout(self.timeout, provider.embed(text)).await;
            match attempt {
                Ok(Ok(vector)) => {
                    self.cache.put(text, vector.clone());
                    return Ok(vector);
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider = provider.name(), error = %e, "embedding provider failed");
                    last_err = Some(e);
                }
                Err(_) => {
                    tracing::warn!(provider = provider.name(), "embedding provider timed out");
                    last_err = Some(crate::error::Error::Timeout);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| crate::error::Error::ProviderUnavailable("no providers configured".into())))
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }
}
