//! SQL migration definitions for the pocsync database.
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
    vec![Migration {
        version: 1,
        description: "Initial schema: calls",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Calls found by domain search, keyed by the upstream call id
CREATE TABLE IF NOT EXISTS calls (
    id                    TEXT PRIMARY KEY,
    account_domain        TEXT NOT NULL,
    external_call_id      TEXT NOT NULL UNIQUE,
    title                 TEXT NOT NULL DEFAULT '',
    started_at            TEXT,
    duration_seconds      INTEGER NOT NULL DEFAULT 0,
    participant_emails    TEXT NOT NULL DEFAULT '[]',
    url                   TEXT,
    transcript_text       TEXT,
    transcript_fetched_at TEXT,
    selected_for_analysis INTEGER NOT NULL DEFAULT 0,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_calls_domain ON calls(account_domain);
CREATE INDEX IF NOT EXISTS idx_calls_started_at ON calls(started_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
