//! Schema migrations, applied sequentially and tracked in `schema_version`.

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema: memory_item, embeddings, links, feedback, fts5",
        up: r#"
CREATE TABLE IF NOT EXISTS memory_item (
    id              TEXT PRIMARY KEY,
    memory_type     TEXT NOT NULL,
    content         TEXT NOT NULL,
    importance      REAL NOT NULL DEFAULT 0.5,
    privacy_scope   TEXT NOT NULL DEFAULT 'private',
    created_at      TEXT NOT NULL,
    last_accessed   TEXT,
    pinned          INTEGER NOT NULL DEFAULT 0,
    tags            TEXT NOT NULL DEFAULT '[]',
    source          TEXT,
    view_count      INTEGER NOT NULL DEFAULT 0,
    cite_count      INTEGER NOT NULL DEFAULT 0,
    edit_count      INTEGER NOT NULL DEFAULT 0,
    project         TEXT,
    user            TEXT,
    agent           TEXT
);

CREATE INDEX IF NOT EXISTS idx_memory_item_type ON memory_item(memory_type);
CREATE INDEX IF NOT EXISTS idx_memory_item_pinned ON memory_item(pinned);
CREATE INDEX IF NOT EXISTS idx_memory_item_created_at ON memory_item(created_at);

CREATE TABLE IF NOT EXISTS memory_embedding (
    memory_id   TEXT PRIMARY KEY REFERENCES memory_item(id) ON DELETE CASCADE,
    vector      BLOB NOT NULL,
    dim         INTEGER NOT NULL,
    model       TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memory_link (
    source_id   TEXT NOT NULL REFERENCES memory_item(id) ON DELETE CASCADE,
    target_id   TEXT NOT NULL REFERENCES memory_item(id) ON DELETE CASCADE,
    relation    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id, relation)
);

CREATE TABLE IF NOT EXISTS memory_feedback (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    memory_id   TEXT NOT NULL REFERENCES memory_item(id) ON DELETE CASCADE,
    event_type  TEXT NOT NULL,
    score       REAL NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memory_feedback_memory_id ON memory_feedback(memory_id);

CREATE VIRTUAL TABLE IF NOT EXISTS memory_item_fts USING fts5(
    content,
    tags,
    source,
    content = 'memory_item',
    content_rowid = 'rowid'
);

CREATE TRIGGER IF NOT EXISTS memory_item_ai AFTER INSERT ON memory_item BEGIN
    INSERT INTO memory_item_fts(rowid, content, tags, source)
    VALUES (new.rowid, new.content, new.tags, new.source);
END;

CREATE TRIGGER IF NOT EXISTS memory_item_ad AFTER DELETE ON memory_item BEGIN
    INSERT INTO memory_item_fts(memory_item_fts, rowid, content, tags, source)
    VALUES ('delete', old.rowid, old.content, old.tags, old.source);
END;

CREATE TRIGGER IF NOT EXISTS memory_item_au AFTER UPDATE ON memory_item BEGIN
    INSERT INTO memory_item_fts(memory_item_fts, rowid, content, tags, source)
    VALUES ('delete', old.rowid, old.content, old.tags, old.source);
    INSERT INTO memory_item_fts(rowid, content, tags, source)
    VALUES (new.rowid, new.content, new.tags, new.source);
END;
"#,
    },
    Migration {
        version: 2,
        description: "corpus document-frequency stats for the local embedder's IDF term",
        up: r#"
CREATE TABLE IF NOT EXISTS memory_token_df (
    token       TEXT PRIMARY KEY,
    doc_count   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS corpus_stats (
    key     TEXT PRIMARY KEY,
    value   INTEGER NOT NULL
);
"#,
    },
];

pub fn apply(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);",
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current {
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![migration.version, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::debug!(version = migration.version, description = migration.description, "applied migration");
        }
    }

    Ok(())
}
