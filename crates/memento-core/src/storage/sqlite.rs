//! SQLite-backed Persistence Gateway (spec §4.1).
//!
//! Holds a dual reader/writer `Connection` pair behind `Mutex`es so `&self`
//! methods stay `Send + Sync` and the gateway can be shared as `Arc<SqliteStorage>`
//! rather than `Arc<Mutex<SqliteStorage>>`.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{
    Feedback, FeedbackEvent, Filter, Link, LinkRelation, Memory, MemoryType, PrivacyScope,
    ScanOrder, StoreInput,
};

use super::migrations;

/// A row returned by a scan, lexical search, or vector search — everything the
/// Ranking Core needs to score a candidate without a second round-trip.
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub memory: Memory,
    pub bm25: Option<f64>,
    pub cosine: Option<f64>,
}

pub struct SqliteStorage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

const MAX_RETRIES: u32 = 8;
const INITIAL_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 1000;

impl SqliteStorage {
    /// Open (creating if necessary) the database at `db_path`, or the default
    /// platform data directory when `None`.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let writer = Connection::open(&path)?;
        Self::configure_connection(&writer)?;
        migrations::apply(&writer)?;

        let reader = Connection::open(&path)?;
        Self::configure_connection(&reader)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if path.exists() {
                let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600));
            }
        }

        Ok(SqliteStorage {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "memento", "memento")
            .ok_or_else(|| Error::internal("could not resolve a platform data directory"))?;
        Ok(dirs.data_dir().join("memento.db"))
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA mmap_size = 268435456;",
        )?;
        Ok(())
    }

    /// Retry a fallible persistence call with exponential backoff and jitter
    /// on contention (spec §5: initial 50ms, cap 1s, up to 8 attempts).
    fn with_retry<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        for attempt in 0..MAX_RETRIES {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if e.is_contention() && attempt + 1 < MAX_RETRIES => {
                    let jitter = rand::thread_rng().gen_range(0..=backoff_ms / 2);
                    std::thread::sleep(Duration::from_millis(backoff_ms + jitter));
                    backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                }
                Err(e) if e.is_contention() => return Err(Error::Contention),
                Err(e) => return Err(e),
            }
        }
        Err(Error::Contention)
    }

    // ------------------------------------------------------------------
    // insert_memory
    // ------------------------------------------------------------------

    pub fn insert_memory(&self, input: StoreInput) -> Result<Memory> {
        let memory_type = input
            .memory_type
            .as_deref()
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(MemoryType::Episodic);
        let privacy_scope = input
            .privacy_scope
            .as_deref()
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();
        let importance = input.importance.unwrap_or(0.5).clamp(0.0, 1.0);

        if input.content.trim().is_empty() {
            return Err(Error::InvalidArgument("content must not be empty".into()));
        }

        let memory = Memory {
            id: Uuid::new_v4().to_string(),
            memory_type,
            content: input.content,
            importance,
            privacy_scope,
            created_at: Utc::now(),
            last_accessed: None,
            pinned: false,
            tags: input.tags,
            source: input.source,
            view_count: 0,
            cite_count: 0,
            edit_count: 0,
            project: None,
            user: None,
            agent: None,
        };

        let tokens = crate::search::lexical::normalize_query(&memory.content);

        self.with_retry(|| {
            let mut conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO memory_item
                 (id, memory_type, content, importance, privacy_scope, created_at,
                  last_accessed, pinned, tags, source, view_count, cite_count, edit_count,
                  project, user, agent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    memory.id,
                    memory.memory_type.as_str(),
                    memory.content,
                    memory.importance,
                    memory.privacy_scope.as_str(),
                    memory.created_at.to_rfc3339(),
                    memory.last_accessed.map(|t| t.to_rfc3339()),
                    memory.pinned as i64,
                    serde_json::to_string(&memory.tags).unwrap_or_else(|_| "[]".into()),
                    memory.source,
                    memory.view_count,
                    memory.cite_count,
                    memory.edit_count,
                    memory.project,
                    memory.user,
                    memory.agent,
                ],
            )?;

            let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
            for token in &tokens {
                if !seen.insert(token.as_str()) {
                    continue;
                }
                tx.execute(
                    "INSERT INTO memory_token_df (token, doc_count) VALUES (?1, 1)
                     ON CONFLICT(token) DO UPDATE SET doc_count = doc_count + 1",
                    params![token],
                )?;
            }
            tx.execute(
                "INSERT INTO corpus_stats (key, value) VALUES ('total_docs', 1)
                 ON CONFLICT(key) DO UPDATE SET value = value + 1",
                [],
            )?;

            tx.commit()?;
            Ok(())
        })?;

        Ok(memory)
    }

    // ------------------------------------------------------------------
    // corpus document-frequency stats (local embedder's IDF term)
    // ------------------------------------------------------------------

    /// Total number of memories that have ever contributed to the
    /// document-frequency table (not reduced by forgetting — the IDF
    /// statistic is corpus-wide and historical, matching `memory_token_df`).
    pub fn total_doc_count(&self) -> Result<u64> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        let count: i64 = conn
            .query_row(
                "SELECT value FROM corpus_stats WHERE key = 'total_docs'",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }

    /// Document frequencies for a batch of tokens in one query, keyed by
    /// token; tokens with no row are simply absent (df = 0).
    pub fn doc_frequencies(&self, tokens: &[String]) -> Result<std::collections::HashMap<String, u64>> {
        if tokens.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        let placeholders = tokens.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT token, doc_count FROM memory_token_df WHERE token IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = tokens.iter().map(|t| t as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let token: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((token, count.max(0) as u64))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().collect())
    }

    // ------------------------------------------------------------------
    // update_flags
    // ------------------------------------------------------------------

    pub fn set_pinned(&self, id: &str, pinned: bool) -> Result<Memory> {
        self.with_retry(|| {
            let conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            let changed = conn.execute(
                "UPDATE memory_item SET pinned = ?1 WHERE id = ?2",
                params![pinned as i64, id],
            )?;
            if changed == 0 {
                return Err(Error::NotFound(id.to_string()));
            }
            Ok(())
        })?;
        self.get(id)
    }

    pub fn touch_last_accessed(&self, id: &str) -> Result<()> {
        self.with_retry(|| {
            let conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            let changed = conn.execute(
                "UPDATE memory_item SET last_accessed = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )?;
            if changed == 0 {
                return Err(Error::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    pub fn record_feedback(&self, memory_id: &str, event: FeedbackEvent, score: f64) -> Result<()> {
        self.with_retry(|| {
            let conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            conn.execute(
                "INSERT INTO memory_feedback (memory_id, event_type, score, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![memory_id, event.as_str(), score, Utc::now().to_rfc3339()],
            )?;
            let counter_column = match event {
                FeedbackEvent::Cited => Some("cite_count"),
                FeedbackEvent::Used => Some("view_count"),
                _ => None,
            };
            if let Some(col) = counter_column {
                conn.execute(
                    &format!(
                        "UPDATE memory_item SET {col} = {col} + 1, last_accessed = ?1 WHERE id = ?2"
                    ),
                    params![Utc::now().to_rfc3339(), memory_id],
                )?;
            }
            Ok(())
        })
    }

    pub fn increment_edit_count(&self, id: &str) -> Result<()> {
        self.with_retry(|| {
            let conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            conn.execute(
                "UPDATE memory_item SET edit_count = edit_count + 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // soft_delete / hard_delete
    // ------------------------------------------------------------------

    /// Unpins and resets counters without removing the row (spec §4.1/§4.8).
    /// Returns 1 if a row was matched, 0 otherwise.
    pub fn soft_delete(&self, id: &str) -> Result<u64> {
        self.with_retry(|| {
            let conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            let changed = conn.execute(
                "UPDATE memory_item
                 SET pinned = 0, view_count = 0, cite_count = 0, edit_count = 0,
                     last_accessed = ?1
                 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )?;
            Ok(changed as u64)
        })
    }

    /// Removes the row, cascading to embedding and links in one transaction
    /// (spec I5).
    pub fn hard_delete(&self, id: &str) -> Result<u64> {
        self.with_retry(|| {
            let mut conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM memory_embedding WHERE memory_id = ?1", params![id])?;
            tx.execute(
                "DELETE FROM memory_link WHERE source_id = ?1 OR target_id = ?1",
                params![id],
            )?;
            tx.execute("DELETE FROM memory_feedback WHERE memory_id = ?1", params![id])?;
            let changed = tx.execute("DELETE FROM memory_item WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(changed as u64)
        })
    }

    // ------------------------------------------------------------------
    // scan_candidates / get
    // ------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Result<Memory> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        conn.query_row(
            "SELECT * FROM memory_item WHERE id = ?1",
            params![id],
            row_to_memory,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn scan_candidates(&self, filter: &Filter, order: ScanOrder, limit: i64) -> Result<Vec<Memory>> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        let (clause, args) = filter_clause(filter);
        let order_clause = match order {
            ScanOrder::CreatedAtDesc => "ORDER BY created_at DESC",
            ScanOrder::CreatedAtAsc => "ORDER BY created_at ASC",
        };
        // `tags` lives as a JSON array column; filter_clause can't express
        // its ANY-match semantics in SQL, so it's re-checked here.
        let sql = format!("SELECT * FROM memory_item {clause} {order_clause}");
        let params_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter(|m| filter.tags.is_empty() || filter.tags.iter().any(|t| m.tags.contains(t)))
            .take(limit.max(0) as usize)
            .collect())
    }

    // ------------------------------------------------------------------
    // embeddings
    // ------------------------------------------------------------------

    pub fn upsert_embedding(&self, memory_id: &str, vector: &[f32], model: &str) -> Result<()> {
        self.with_retry(|| {
            let conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
            conn.execute(
                "INSERT INTO memory_embedding (memory_id, vector, dim, model, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(memory_id) DO UPDATE SET
                   vector = excluded.vector, dim = excluded.dim,
                   model = excluded.model, created_at = excluded.created_at",
                params![memory_id, bytes, vector.len() as i64, model, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn get_embedding(&self, memory_id: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM memory_embedding WHERE memory_id = ?1",
                params![memory_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.map(|b| {
            b.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        }))
    }

    pub fn all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        let mut stmt = conn.prepare("SELECT memory_id, vector FROM memory_embedding")?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                Ok((id, bytes))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .map(|(id, bytes)| {
                let vector = bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                (id, vector)
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // links / feedback lookups (used by scenario tests and cascade checks)
    // ------------------------------------------------------------------

    pub fn insert_link(&self, link: &Link) -> Result<()> {
        self.with_retry(|| {
            let conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
            conn.execute(
                "INSERT OR IGNORE INTO memory_link (source_id, target_id, relation, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    link.source_id,
                    link.target_id,
                    link.relation.as_str(),
                    link.created_at.to_rfc3339()
                ],
            )?;
            Ok(())
        })
    }

    pub fn links_touching(&self, id: &str) -> Result<Vec<Link>> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, relation, created_at FROM memory_link
             WHERE source_id = ?1 OR target_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                let relation: String = row.get(2)?;
                let created_at: String = row.get(3)?;
                Ok(Link {
                    source_id: row.get(0)?,
                    target_id: row.get(1)?,
                    relation: relation.parse().unwrap_or(LinkRelation::References),
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn feedback_for(&self, memory_id: &str) -> Result<Vec<Feedback>> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        let mut stmt = conn.prepare(
            "SELECT memory_id, event_type, score, created_at FROM memory_feedback WHERE memory_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![memory_id], |row| {
                let event_type: String = row.get(1)?;
                let created_at: String = row.get(3)?;
                Ok(Feedback {
                    memory_id: row.get(0)?,
                    event_type: event_type.parse().unwrap_or(FeedbackEvent::Used),
                    score: row.get(2)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // lexical_search
    // ------------------------------------------------------------------

    /// Full-text match over content/tags/source (spec §4.4). An empty query
    /// is valid and still returns the filter-matching set.
    pub fn lexical_search(&self, text: &str, filter: &Filter, k: i64) -> Result<Vec<CandidateRow>> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        let sanitized = crate::search::lexical::sanitize_fts5_query(text);

        if sanitized.trim().is_empty() {
            let (clause, args) = filter_clause(filter);
            let sql = format!("SELECT * FROM memory_item {clause} ORDER BY created_at DESC");
            let params_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_refs.as_slice(), row_to_memory)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            return Ok(rows
                .into_iter()
                .filter(|m| memory_matches_filter(m, filter))
                .take(k.max(0) as usize)
                .map(|memory| CandidateRow {
                    memory,
                    bm25: None,
                    cosine: None,
                })
                .collect());
        }

        let mut stmt = conn.prepare(
            "SELECT mi.*, fts.rank AS rank
             FROM memory_item_fts fts
             JOIN memory_item mi ON mi.rowid = fts.rowid
             WHERE memory_item_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![sanitized, k], |row| {
                let memory = row_to_memory(row)?;
                let rank: f64 = row.get("rank")?;
                Ok((memory, rank))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter(|(memory, _)| memory_matches_filter(memory, filter))
            .map(|(memory, rank)| CandidateRow {
                memory,
                // FTS5 `rank` is a negative bm25-like value; flip sign so
                // higher is better before the Ranking Core normalizes it.
                bm25: Some(-rank),
                cosine: None,
            })
            .collect())
    }

    pub fn checkpoint(&self) -> Result<()> {
        let conn = self.writer.lock().map_err(|_| Error::internal("writer lock poisoned"))?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE); PRAGMA optimize;")?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.reader.lock().map_err(|_| Error::internal("reader lock poisoned"))?;
        Ok(conn.query_row("SELECT COUNT(*) FROM memory_item", [], |r| r.get(0))?)
    }
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let tags_json: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    let memory_type: String = row.get("memory_type")?;
    let privacy_scope: String = row.get("privacy_scope")?;
    let created_at: String = row.get("created_at")?;
    let last_accessed: Option<String> = row.get("last_accessed")?;

    Ok(Memory {
        id: row.get("id")?,
        memory_type: memory_type.parse().unwrap_or(MemoryType::Episodic),
        content: row.get("content")?,
        importance: row.get("importance")?,
        privacy_scope: privacy_scope.parse().unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        last_accessed: last_accessed.and_then(|t| {
            DateTime::parse_from_rfc3339(&t)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        }),
        pinned: row.get::<_, i64>("pinned")? != 0,
        tags,
        source: row.get("source")?,
        view_count: row.get("view_count")?,
        cite_count: row.get("cite_count")?,
        edit_count: row.get("edit_count")?,
        project: row.get("project")?,
        user: row.get("user")?,
        agent: row.get("agent")?,
    })
}

fn filter_clause(filter: &Filter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if !filter.memory_type.is_empty() {
        let placeholders = filter
            .memory_type
            .iter()
            .map(|_| "?")
            .collect::<Vec<_>>()
            .join(",");
        clauses.push(format!("memory_type IN ({placeholders})"));
        for t in &filter.memory_type {
            args.push(Box::new(t.clone()));
        }
    }
    if let Some(pinned) = filter.pinned {
        clauses.push("pinned = ?".to_string());
        args.push(Box::new(pinned as i64));
    }
    if !filter.privacy_scope.is_empty() {
        let placeholders = filter
            .privacy_scope
            .iter()
            .map(|_| "?")
            .collect::<Vec<_>>()
            .join(",");
        clauses.push(format!("privacy_scope IN ({placeholders})"));
        for p in &filter.privacy_scope {
            args.push(Box::new(p.clone()));
        }
    }
    if !filter.id.is_empty() {
        let placeholders = filter.id.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        clauses.push(format!("id IN ({placeholders})"));
        for id in &filter.id {
            args.push(Box::new(id.clone()));
        }
    }
    if let Some(from) = filter.time_from {
        clauses.push("created_at >= ?".to_string());
        args.push(Box::new(from.to_rfc3339()));
    }
    if let Some(to) = filter.time_to {
        clauses.push("created_at <= ?".to_string());
        args.push(Box::new(to.to_rfc3339()));
    }
    if let Some(min) = filter.importance_min {
        clauses.push("importance >= ?".to_string());
        args.push(Box::new(min));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, args)
}

/// Post-filters an FTS5 hit against the full filter set. The `MATCH` query
/// above carries no `WHERE` clause of its own (FTS5 doesn't compose with the
/// rest of `filter_clause`), so every predicate — not just tag membership —
/// has to be re-checked here.
fn memory_matches_filter(memory: &Memory, filter: &Filter) -> bool {
    filter.matches(memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoreInput;

    fn test_storage() -> (SqliteStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        (SqliteStorage::new(Some(path)).unwrap(), dir)
    }

    #[test]
    fn insert_and_get_roundtrips() {
        let (storage, _dir) = test_storage();
        let memory = storage
            .insert_memory(StoreInput {
                content: "hello world".into(),
                memory_type: None,
                tags: vec!["greeting".into()],
                importance: Some(0.7),
                source: None,
                privacy_scope: None,
            })
            .unwrap();
        let fetched = storage.get(&memory.id).unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.importance, 0.7);
    }

    #[test]
    fn empty_content_is_rejected() {
        let (storage, _dir) = test_storage();
        let result = storage.insert_memory(StoreInput {
            content: "   ".into(),
            memory_type: None,
            tags: vec![],
            importance: None,
            source: None,
            privacy_scope: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn pin_then_unpin_is_idempotent() {
        let (storage, _dir) = test_storage();
        let memory = storage
            .insert_memory(StoreInput {
                content: "pin me".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .unwrap();
        storage.set_pinned(&memory.id, true).unwrap();
        let unpinned = storage.set_pinned(&memory.id, false).unwrap();
        assert!(!unpinned.pinned);
        assert_eq!(unpinned.view_count, 0);
    }

    #[test]
    fn hard_delete_cascades() {
        let (storage, _dir) = test_storage();
        let a = storage
            .insert_memory(StoreInput {
                content: "a".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .unwrap();
        let b = storage
            .insert_memory(StoreInput {
                content: "b".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .unwrap();
        storage.upsert_embedding(&a.id, &[1.0, 2.0], "local").unwrap();
        storage
            .insert_link(&Link {
                source_id: a.id.clone(),
                target_id: b.id.clone(),
                relation: LinkRelation::References,
                created_at: Utc::now(),
            })
            .unwrap();

        let deleted = storage.hard_delete(&a.id).unwrap();
        assert_eq!(deleted, 1);
        assert!(storage.get(&a.id).is_err());
        assert!(storage.get_embedding(&a.id).unwrap().is_none());
        assert!(storage.links_touching(&a.id).unwrap().is_empty());
    }

    #[test]
    fn lexical_search_empty_query_returns_filter_matches() {
        let (storage, _dir) = test_storage();
        storage
            .insert_memory(StoreInput {
                content: "anything at all".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .unwrap();
        let results = storage.lexical_search("", &Filter::default(), 10).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn lexical_search_matches_content() {
        let (storage, _dir) = test_storage();
        storage
            .insert_memory(StoreInput {
                content: "hybrid search engine architecture overview".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .unwrap();
        storage
            .insert_memory(StoreInput {
                content: "cooking recipe for pasta".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .unwrap();
        let results = storage
            .lexical_search("hybrid search", &Filter::default(), 10)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].memory.content.contains("hybrid"));
    }

    #[test]
    fn insert_memory_records_token_document_frequencies() {
        let (storage, _dir) = test_storage();
        storage
            .insert_memory(StoreInput {
                content: "hybrid search engine".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .unwrap();
        storage
            .insert_memory(StoreInput {
                content: "hybrid search algorithm".into(),
                memory_type: None,
                tags: vec![],
                importance: None,
                source: None,
                privacy_scope: None,
            })
            .unwrap();

        assert_eq!(storage.total_doc_count().unwrap(), 2);
        let df = storage
            .doc_frequencies(&["hybrid".to_string(), "engine".to_string(), "nonexistent".to_string()])
            .unwrap();
        assert_eq!(df.get("hybrid"), Some(&2));
        assert_eq!(df.get("engine"), Some(&1));
        assert_eq!(df.get("nonexistent"), None);
    }
}
