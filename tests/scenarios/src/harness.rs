use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use memento_core::config::Config;
use memento_core::embeddings::ProviderChain;
use memento_core::ranking::RelevanceWeights;
use memento_core::search::{HybridResult, HybridSearcher, VectorStore};
use memento_core::storage::SqliteStorage;
use memento_core::{Filter, Memory, MemoryEngine, StoreInput};
use rusqlite::{params, Connection};
use tempfile::TempDir;

/// Owns a `MemoryEngine` wired to a temp-directory SQLite file, plus the
/// few test-only hooks the public tool surface has no reason to expose:
/// backdating a memory's `created_at` and polling for the fire-and-forget
/// embedding to land.
pub struct Harness {
    pub engine: Arc<MemoryEngine>,
    db_path: PathBuf,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let db_path = dir.path().join("harness.db");
        let engine = MemoryEngine::new(Some(db_path.clone()), config).expect("engine init");
        Harness {
            engine,
            db_path,
            _dir: dir,
        }
    }

    /// Stores a memory and returns its assigned id.
    pub async fn seed(&self, content: &str, memory_type: &str, tags: &[&str], importance: f64) -> String {
        let result = self
            .engine
            .store(StoreInput {
                content: content.to_string(),
                memory_type: Some(memory_type.to_string()),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                importance: Some(importance),
                source: None,
                privacy_scope: None,
            })
            .await
            .expect("store");
        result.memory_id
    }

    pub async fn pin(&self, id: &str) {
        self.engine.pin(id).await.expect("pin");
    }

    /// Rewrites `created_at` for `id` to `age_days` in the past. The store
    /// API has no way to backdate a memory, but the Ranking Core and
    /// Forgetting Controller both key their scoring off `created_at`, so
    /// property tests for halflife and TTL need direct control over it.
    pub fn backdate(&self, id: &str, age_days: f64) {
        let conn = Connection::open(&self.db_path).expect("open db");
        let ts = (Utc::now() - Duration::milliseconds((age_days * 86_400_000.0) as i64)).to_rfc3339();
        conn.execute(
            "UPDATE memory_item SET created_at = ?1 WHERE id = ?2",
            params![ts, id],
        )
        .expect("backdate");
    }

    /// Polls until `id` has a persisted embedding row, or gives up after
    /// `attempts` checks. Store enqueues embedding as fire-and-forget (spec
    /// §5); tests that assert on vector-search behavior need to know it has
    /// landed before they query.
    pub async fn wait_for_embedding(&self, id: &str, attempts: usize) -> bool {
        for _ in 0..attempts {
            let conn = Connection::open(&self.db_path).expect("open db");
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM memory_embedding WHERE memory_id = ?1)",
                    params![id],
                    |row| row.get(0),
                )
                .expect("query embedding");
            if exists {
                return true;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        false
    }

    pub fn embedding_model(&self, id: &str) -> Option<String> {
        let conn = Connection::open(&self.db_path).expect("open db");
        conn.query_row(
            "SELECT model FROM memory_embedding WHERE memory_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .ok()
    }

    pub fn embedding_dim(&self, id: &str) -> Option<i64> {
        let conn = Connection::open(&self.db_path).expect("open db");
        conn.query_row(
            "SELECT dim FROM memory_embedding WHERE memory_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .ok()
    }

    /// Inserts a `derived_from` link directly — links have no tool-surface
    /// writer (spec §6 lists no link operation), so S3 seeds one at the
    /// storage layer the same way the Persistence Gateway's own tests do.
    pub fn seed_link(&self, source_id: &str, target_id: &str) {
        let conn = Connection::open(&self.db_path).expect("open db");
        conn.execute(
            "INSERT INTO memory_link (source_id, target_id, relation, created_at) VALUES (?1, ?2, 'derived_from', ?3)",
            params![source_id, target_id, Utc::now().to_rfc3339()],
        )
        .expect("insert link");
    }

    pub fn links_touching(&self, id: &str) -> usize {
        let conn = Connection::open(&self.db_path).expect("open db");
        conn.query_row(
            "SELECT COUNT(*) FROM memory_link WHERE source_id = ?1 OR target_id = ?1",
            params![id],
            |row| row.get::<_, i64>(0),
        )
        .unwrap_or(0) as usize
    }

    pub fn feedback_rows(&self, id: &str) -> usize {
        let conn = Connection::open(&self.db_path).expect("open db");
        conn.query_row(
            "SELECT COUNT(*) FROM memory_feedback WHERE memory_id = ?1",
            params![id],
            |row| row.get::<_, i64>(0),
        )
        .unwrap_or(0) as usize
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn no_filter() -> Filter {
    Filter::default()
}

/// Bypasses `MemoryEngine`'s fire-and-forget embedding queue for tests that
/// need to know exactly which memories are vector-indexed at the moment
/// `search` runs (S1, S2, S6) — the same pattern
/// `memento_core::search::hybrid`'s own tests use: drive `SqliteStorage` and
/// `HybridSearcher` directly and embed only on request.
pub struct SearchHarness {
    pub storage: Arc<SqliteStorage>,
    pub providers: Arc<ProviderChain>,
    pub vector_store: Arc<VectorStore>,
    pub searcher: HybridSearcher,
    db_path: PathBuf,
    _dir: TempDir,
}

impl SearchHarness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let db_path = dir.path().join("search.db");
        let storage = Arc::new(SqliteStorage::new(Some(db_path.clone())).expect("storage"));
        let config = Config::default();
        let providers = Arc::new(ProviderChain::from_config(&config, Some(storage.clone())));
        let vector_store = Arc::new(VectorStore::new(config.embedding_dimensions).expect("vector store"));
        let searcher = HybridSearcher::new(
            storage.clone(),
            providers.clone(),
            Some(vector_store.clone()),
            config.ranking_weights,
            RelevanceWeights::default(),
            StdDuration::from_millis(config.search_timeout_ms),
        );
        SearchHarness {
            storage,
            providers,
            vector_store,
            searcher,
            db_path,
            _dir: dir,
        }
    }

    pub fn seed(&self, content: &str, memory_type: &str, tags: &[&str], importance: f64, pinned: bool) -> Memory {
        let memory = self
            .storage
            .insert_memory(StoreInput {
                content: content.to_string(),
                memory_type: Some(memory_type.to_string()),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                importance: Some(importance),
                source: None,
                privacy_scope: None,
            })
            .expect("insert memory");
        if pinned {
            self.storage.set_pinned(&memory.id, true).expect("pin");
        }
        memory
    }

    pub fn backdate(&self, id: &str, age_days: f64) {
        let conn = Connection::open(&self.db_path).expect("open db");
        let ts = (Utc::now() - Duration::milliseconds((age_days * 86_400_000.0) as i64)).to_rfc3339();
        conn.execute(
            "UPDATE memory_item SET created_at = ?1 WHERE id = ?2",
            params![ts, id],
        )
        .expect("backdate");
    }

    /// Embeds `memory` and indexes it in both the persisted embedding table
    /// and the in-memory vector store, so it becomes eligible as a vector
    /// candidate on the next `search`.
    pub async fn embed(&self, memory: &Memory) {
        let vector = self.providers.embed(&memory.content).await.expect("embed");
        self.storage
            .upsert_embedding(&memory.id, &vector, "local")
            .expect("upsert embedding");
        self.vector_store.upsert(&memory.id, &vector).expect("vector upsert");
    }

    pub async fn search(&self, query: &str, filter: &Filter, limit: usize) -> HybridResult {
        self.searcher.search(query, filter, limit).await.expect("search")
    }
}

impl Default for SearchHarness {
    fn default() -> Self {
        Self::new()
    }
}
