// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the history database
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 1;

-- domain: one row per site pattern, created on demand by history imports
CREATE TABLE IF NOT EXISTS domain (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    color TEXT NOT NULL,
    pattern TEXT NOT NULL UNIQUE,
    sort INTEGER NOT NULL DEFAULT 0,
    deleted_at INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_domain_sort ON domain(sort);

-- history: visited pages, soft deleted through deleted_at
CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    last_visited INTEGER NOT NULL,
    domain_id INTEGER NOT NULL REFERENCES domain(id),
    deleted_at INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_domain ON history(domain_id);
CREATE INDEX IF NOT EXISTS idx_history_last_visited ON history(last_visited DESC);
"#;
