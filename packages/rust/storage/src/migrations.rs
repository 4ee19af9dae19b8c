//! SQL migration definitions for the dxtscout record store.
//!
//! Migrations are applied in order on open. Each migration has a version
//! number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: extensions, non_matches, discovery_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Confirmed extensions, one row per repository
CREATE TABLE IF NOT EXISTS extensions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_name        TEXT NOT NULL UNIQUE,
    repo_url         TEXT NOT NULL DEFAULT '',
    stars            INTEGER NOT NULL DEFAULT 0,
    repo_updated_at  TEXT NOT NULL DEFAULT '',
    discovered_at    TEXT NOT NULL,
    last_checked_at  TEXT NOT NULL,

    name             TEXT NOT NULL DEFAULT '',
    display_name     TEXT NOT NULL DEFAULT '',
    version          TEXT NOT NULL DEFAULT '',
    description      TEXT NOT NULL DEFAULT '',
    long_description TEXT NOT NULL DEFAULT '',
    author_name      TEXT NOT NULL DEFAULT '',
    author_email     TEXT NOT NULL DEFAULT '',
    author_url       TEXT NOT NULL DEFAULT '',
    homepage         TEXT NOT NULL DEFAULT '',
    documentation    TEXT NOT NULL DEFAULT '',
    keywords         TEXT NOT NULL DEFAULT '[]',
    license          TEXT NOT NULL DEFAULT '',
    server_type      TEXT NOT NULL DEFAULT '',
    tools            TEXT NOT NULL DEFAULT '[]',
    tools_count      INTEGER NOT NULL DEFAULT 0,
    has_user_config  INTEGER NOT NULL DEFAULT 0,
    schema_version   TEXT NOT NULL DEFAULT '',
    manifest_raw     TEXT NOT NULL DEFAULT '',
    manifest_path    TEXT NOT NULL DEFAULT '',

    -- Owned by the categorization and digest transforms
    category               TEXT,
    category_reasoning     TEXT,
    featured_in_newsletter INTEGER NOT NULL DEFAULT 0,
    newsletter_date        TEXT,
    featured_in_issue      INTEGER
);

CREATE INDEX IF NOT EXISTS idx_extensions_digest_order
    ON extensions(stars DESC, discovered_at DESC);
CREATE INDEX IF NOT EXISTS idx_extensions_category ON extensions(category);

-- Repositories checked without finding a valid manifest
CREATE TABLE IF NOT EXISTS non_matches (
    repo_name  TEXT PRIMARY KEY,
    checked_at TEXT NOT NULL
);

-- Discovery run journal
CREATE TABLE IF NOT EXISTS discovery_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
