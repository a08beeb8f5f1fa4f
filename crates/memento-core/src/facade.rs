//! The `MemoryEngine` facade (SPEC_FULL.md §2): the single entry point the
//! MCP layer binds to. Owns every `Arc`-shared component — Persistence
//! Gateway, provider chain, vector index, embedding cache, scheduler — and
//! exposes the five tool operations (store, search, pin, unpin, forget) plus
//! the inject prompt as thin methods, so `memento-mcp`'s tool adapters stay
//! thin wrappers over this type.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::embeddings::ProviderChain;
use crate::error::{Error, Result};
use crate::forgetting::{ForgettingController, SweepReport};
use crate::inject::{ContextInjector, InjectRequest, InjectResult};
use crate::model::{Feedback, FeedbackEvent, Filter, Memory, StoreInput};
use crate::ranking::RelevanceWeights;
use crate::scheduler::Scheduler;
use crate::search::{HybridResult, HybridSearcher, VectorStore};
use crate::storage::SqliteStorage;

/// Bound on the fire-and-forget embedding queue (spec §5). Overflow drops the
/// oldest pending job rather than the newest, so a burst of stores never
/// starves the ones already waiting closest to completion — `mpsc` channels
/// natively drop the newest send on a full bounded channel, so the queue is
/// a small hand-rolled ring buffer instead.
const EMBED_QUEUE_CAPACITY: usize = 1000;

struct EmbedJob {
    memory_id: String,
    content: String,
}

struct EmbedQueue {
    jobs: Mutex<VecDeque<EmbedJob>>,
    notify: Notify,
}

impl EmbedQueue {
    fn new() -> Self {
        EmbedQueue {
            jobs: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn push(&self, job: EmbedJob) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if jobs.len() >= EMBED_QUEUE_CAPACITY {
            if let Some(dropped) = jobs.pop_front() {
                tracing::warn!(
                    memory_id = %dropped.memory_id,
                    "embedding queue full, dropping oldest pending job"
                );
            }
        }
        jobs.push_back(job);
        drop(jobs);
        self.notify.notify_one();
    }

    async fn recv(&self) -> EmbedJob {
        loop {
            let notified = self.notify.notified();
            {
                let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if let Some(job) = jobs.pop_front() {
                    return job;
                }
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreResult {
    pub memory_id: String,
    pub embedding_queued: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinResult {
    pub id: String,
    pub pinned: bool,
    pub already_pinned: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpinResult {
    pub id: String,
    pub pinned: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgetResult {
    pub id: String,
    pub mode: &'static str,
}

pub struct MemoryEngine {
    storage: Arc<SqliteStorage>,
    providers: Arc<ProviderChain>,
    vector_store: Option<Arc<VectorStore>>,
    searcher: Arc<HybridSearcher>,
    injector: ContextInjector,
    forgetting: Arc<ForgettingController>,
    scheduler: Arc<Scheduler>,
    embed_queue: Arc<EmbedQueue>,
    embed_worker: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryEngine {
    /// Assembles every component from `config`, rebuilds the vector index
    /// from whatever embeddings are already on disk, and spawns the
    /// fire-and-forget embedding worker. Does not start the scheduler —
    /// callers opt in via [`MemoryEngine::start_scheduler`].
    pub fn new(data_dir: Option<PathBuf>, config: Config) -> Result<Arc<Self>> {
        let storage = Arc::new(SqliteStorage::new(data_dir)?);
        let providers = Arc::new(ProviderChain::from_config(&config, Some(storage.clone())));

        let vector_store = match storage.all_embeddings() {
            Ok(embeddings) => match VectorStore::rebuild(config.embedding_dimensions, embeddings) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    tracing::warn!(error = %e, "vector index unavailable, falling back to lexical-only search");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "could not load embeddings to rebuild vector index");
                None
            }
        };

        let searcher = Arc::new(HybridSearcher::new(
            storage.clone(),
            providers.clone(),
            vector_store.clone(),
            config.ranking_weights,
            RelevanceWeights::default(),
            Duration::from_millis(config.search_timeout_ms),
        ));
        let injector = ContextInjector::new(searcher.clone());
        let forgetting = Arc::new(ForgettingController::new(storage.clone(), config.forget.clone()));
        let scheduler = Arc::new(Scheduler::new(
            forgetting.clone(),
            storage.clone(),
            providers.cache().clone(),
            config.scheduler,
        ));

        let engine = Arc::new(MemoryEngine {
            storage,
            providers,
            vector_store,
            searcher,
            injector,
            forgetting,
            scheduler,
            embed_queue: Arc::new(EmbedQueue::new()),
            embed_worker: Mutex::new(None),
        });

        let handle = tokio::spawn(embed_worker_loop(
            engine.embed_queue.clone(),
            engine.storage.clone(),
            engine.providers.clone(),
            engine.vector_store.clone(),
        ));
        *engine
            .embed_worker
            .lock()
            .map_err(|_| Error::internal("embed worker lock poisoned"))? = Some(handle);

        Ok(engine)
    }

    pub fn start_scheduler(&self) -> Result<()> {
        self.scheduler.start()
    }

    pub fn stop_scheduler(&self) {
        self.scheduler.stop();
    }

    pub fn scheduler_metrics(&self) -> Arc<crate::scheduler::SchedulerMetrics> {
        self.scheduler.metrics.clone()
    }

    /// `store` (spec §6): commits the row, then enqueues embedding as
    /// fire-and-forget — an embedding failure or delay never fails the
    /// store itself (spec §5).
    pub async fn store(&self, input: StoreInput) -> Result<StoreResult> {
        let storage = self.storage.clone();
        let memory = tokio::task::spawn_blocking(move || storage.insert_memory(input))
            .await
            .map_err(|e| Error::internal(e.to_string()))??;

        self.embed_queue.push(EmbedJob {
            memory_id: memory.id.clone(),
            content: memory.content.clone(),
        });

        Ok(StoreResult {
            memory_id: memory.id,
            embedding_queued: true,
        })
    }

    /// `search` (spec §6): hybrid lexical+vector retrieval through the
    /// Ranking Core.
    pub async fn search(&self, query: &str, filter: &Filter, limit: usize) -> Result<HybridResult> {
        self.searcher.search(query, filter, limit).await
    }

    pub async fn get(&self, id: &str) -> Result<Memory> {
        let storage = self.storage.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || storage.get(&id))
            .await
            .map_err(|e| Error::internal(e.to_string()))?
    }

    /// `pin` (spec §6): idempotent; reports whether the memory was already
    /// pinned before this call.
    pub async fn pin(&self, id: &str) -> Result<PinResult> {
        let storage = self.storage.clone();
        let id_owned = id.to_string();
        let before = {
            let storage = storage.clone();
            let id_owned = id_owned.clone();
            tokio::task::spawn_blocking(move || storage.get(&id_owned))
                .await
                .map_err(|e| Error::internal(e.to_string()))??
        };
        let already_pinned = before.pinned;
        tokio::task::spawn_blocking(move || storage.set_pinned(&id_owned, true))
            .await
            .map_err(|e| Error::internal(e.to_string()))??;
        Ok(PinResult {
            id: id.to_string(),
            pinned: true,
            already_pinned,
        })
    }

    /// `unpin` (spec §6): idempotent (P2).
    pub async fn unpin(&self, id: &str) -> Result<UnpinResult> {
        let storage = self.storage.clone();
        let id_owned = id.to_string();
        tokio::task::spawn_blocking(move || storage.set_pinned(&id_owned, false))
            .await
            .map_err(|e| Error::internal(e.to_string()))??;
        Ok(UnpinResult {
            id: id.to_string(),
            pinned: false,
        })
    }

    /// `forget` (spec §6): soft-delete by default, hard-delete (cascading to
    /// embedding, links, and feedback — P3) when `hard` is set.
    pub async fn forget(&self, id: &str, hard: bool) -> Result<ForgetResult> {
        let storage = self.storage.clone();
        let id_owned = id.to_string();
        if hard {
            let changed = tokio::task::spawn_blocking({
                let storage = storage.clone();
                let id_owned = id_owned.clone();
                move || storage.hard_delete(&id_owned)
            })
            .await
            .map_err(|e| Error::internal(e.to_string()))??;
            if changed == 0 {
                return Err(Error::NotFound(id.to_string()));
            }
            if let Some(store) = &self.vector_store {
                store.remove(&id_owned);
            }
            Ok(ForgetResult {
                id: id.to_string(),
                mode: "hard",
            })
        } else {
            let changed = tokio::task::spawn_blocking(move || storage.soft_delete(&id_owned))
                .await
                .map_err(|e| Error::internal(e.to_string()))??;
            if changed == 0 {
                return Err(Error::NotFound(id.to_string()));
            }
            Ok(ForgetResult {
                id: id.to_string(),
                mode: "soft",
            })
        }
    }

    /// `inject` (spec §6): the only prompt in the tool surface.
    pub async fn inject(&self, request: InjectRequest) -> Result<InjectResult> {
        self.injector.inject(&request).await
    }

    /// Records a feedback event. Not part of the five-operation tool
    /// surface, but required for the usage/spaced-review inputs those
    /// operations feed (spec §3); refreshes `last_accessed` only for
    /// `used`/`cited` events, never on a plain read (Open Question #1 in
    /// SPEC_FULL.md §9).
    pub async fn record_feedback(&self, memory_id: &str, event: FeedbackEvent, score: f64) -> Result<()> {
        let storage = self.storage.clone();
        let id = memory_id.to_string();
        tokio::task::spawn_blocking(move || storage.record_feedback(&id, event, score))
            .await
            .map_err(|e| Error::internal(e.to_string()))?
    }

    pub async fn feedback_for(&self, memory_id: &str) -> Result<Vec<Feedback>> {
        let storage = self.storage.clone();
        let id = memory_id.to_string();
        tokio::task::spawn_blocking(move || storage.feedback_for(&id))
            .await
            .map_err(|e| Error::internal(e.to_string()))?
    }

    /// Runs one forgetting sweep immediately, outside the scheduler's own
    /// cadence. Used by the scheduler's own tick and by tests.
    pub async fn run_forget_sweep(&self) -> Result<SweepReport> {
        let forgetting = self.forgetting.clone();
        tokio::task::spawn_blocking(move || forgetting.run_sweep())
            .await
            .map_err(|e| Error::internal(e.to_string()))?
    }

    pub fn checkpoint(&self) -> Result<()> {
        self.storage.checkpoint()
    }
}

impl Drop for MemoryEngine {
    fn drop(&mut self) {
        self.scheduler.stop();
        let worker = self.embed_worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        if let Some(handle) = worker {
            handle.abort();
        }
    }
}

async fn embed_worker_loop(
    queue: Arc<EmbedQueue>,
    storage: Arc<SqliteStorage>,
    providers: Arc<ProviderChain>,
    vector_store: Option<Arc<VectorStore>>,
) {
    loop {
        let job = queue.recv().await;
        let vector = match providers.embed(&job.content).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(memory_id = %job.memory_id, error = %e, "embedding failed, memory stays lexical-only");
                continue;
            }
        };

        let storage = storage.clone();
        let memory_id = job.memory_id.clone();
        let vector_for_storage = vector.clone();
        let stored = tokio::task::spawn_blocking(move || {
            storage.upsert_embedding(&memory_id, &vector_for_storage, "local")
        })
        .await;

        match stored {
            Ok(Ok(())) => {
                if let Some(store) = &vector_store {
                    if let Err(e) = store.upsert(&job.memory_id, &vector) {
                        tracing::warn!(memory_id = %job.memory_id, error = %e, "vector index upsert failed");
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(memory_id = %job.memory_id, error = %e, "embedding persistence failed");
            }
            Err(e) => {
                tracing::warn!(memory_id = %job.memory_id, error = %e, "embedding persistence task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrivacyScope;

    async fn test_engine() -> (Arc<MemoryEngine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = MemoryEngine::new(Some(dir.path().join("t.db")), Config::default()).unwrap();
        (engine, dir)
    }

    #[tokio::test]
    async fn store_then_search_by_id_filter_matches_p1() {
        let (engine, _dir) = test_engine().await;
        let stored = engine
            .store(StoreInput {
                content: "a note about onboarding".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .await
            .unwrap();
        assert!(stored.embedding_queued);

        let filter = Filter {
            id: vec![stored.memory_id.clone()],
            ..Default::default()
        };
        let result = engine.search("", &filter, 5).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].memory.id, stored.memory_id);
    }

    #[tokio::test]
    async fn pin_then_unpin_is_idempotent_p2() {
        let (engine, _dir) = test_engine().await;
        let stored = engine
            .store(StoreInput {
                content: "pin me".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .await
            .unwrap();

        let pinned = engine.pin(&stored.memory_id).await.unwrap();
        assert!(!pinned.already_pinned);
        let pinned_again = engine.pin(&stored.memory_id).await.unwrap();
        assert!(pinned_again.already_pinned);

        let unpinned = engine.unpin(&stored.memory_id).await.unwrap();
        assert!(!unpinned.pinned);

        let memory = engine.get(&stored.memory_id).await.unwrap();
        assert!(!memory.pinned);
        assert_eq!(memory.view_count, 0);
        assert_eq!(memory.cite_count, 0);
    }

    #[tokio::test]
    async fn hard_forget_cascades_p3() {
        let (engine, _dir) = test_engine().await;
        let stored = engine
            .store(StoreInput {
                content: "ephemeral scratch note".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: Some(PrivacyScope::Private),
            })
            .await
            .unwrap();

        let result = engine.forget(&stored.memory_id, true).await.unwrap();
        assert_eq!(result.mode, "hard");

        let err = engine.get(&stored.memory_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn forget_missing_id_is_not_found() {
        let (engine, _dir) = test_engine().await;
        let err = engine.forget("does-not-exist", false).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
