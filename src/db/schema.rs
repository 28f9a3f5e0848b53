/// Schema for the offline database.
pub const SCHEMA: &str = r#"
-- Inserts made while offline, waiting to be replayed (one row per todo id)
CREATE TABLE IF NOT EXISTS pending_todos (
    id INTEGER PRIMARY KEY,
    data BLOB NOT NULL,
    queued_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per cache generation, e.g. "todo-v3". `seeded` is set only by the
-- transaction that stored the whole static manifest.
CREATE TABLE IF NOT EXISTS cache_namespaces (
    name TEXT PRIMARY KEY,
    seeded INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses, keyed by the hash of the request line
CREATE TABLE IF NOT EXISTS cache_entries (
    namespace TEXT NOT NULL,
    request_key TEXT NOT NULL,
    request_line TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, request_key),
    FOREIGN KEY (namespace) REFERENCES cache_namespaces(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_namespace ON cache_entries(namespace);
"#;
