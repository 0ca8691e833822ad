//! SQL migration definitions for the URL store database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: urls work queue",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Discovered source URLs and their extraction lifecycle
CREATE TABLE IF NOT EXISTS urls (
    url                 TEXT PRIMARY KEY,
    source              TEXT NOT NULL,
    display_name        TEXT,
    submission_url      TEXT,
    extracted           INTEGER NOT NULL DEFAULT 0,
    extraction_failed   INTEGER NOT NULL DEFAULT 0,
    retry_count         INTEGER NOT NULL DEFAULT 0,
    max_retries_reached INTEGER NOT NULL DEFAULT 0,
    fetch_method        TEXT NOT NULL DEFAULT 'static',
    is_spa              INTEGER NOT NULL DEFAULT 0,
    http_status         INTEGER,
    error_reason        TEXT,
    last_attempt_time   TEXT,
    added_time          TEXT NOT NULL,
    CHECK (NOT (extracted = 1 AND extraction_failed = 1))
);

CREATE INDEX IF NOT EXISTS idx_urls_status ON urls(extracted, extraction_failed);
CREATE INDEX IF NOT EXISTS idx_urls_added ON urls(added_time);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index failed entries by reason for retry selection and resets",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_urls_failed_reason
    ON urls(extraction_failed, max_retries_reached, error_reason);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
