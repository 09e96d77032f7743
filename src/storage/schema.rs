//! Database schema definitions.
//!
//! Contains SQL schema and migration logic for the nullwipe `SQLite` database.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Finished wipe runs
CREATE TABLE IF NOT EXISTS wipe_runs (
    id TEXT PRIMARY KEY,             -- job UUID
    device TEXT NOT NULL,
    kind TEXT NOT NULL,
    method TEXT NOT NULL,
    status TEXT NOT NULL,
    success INTEGER NOT NULL,
    verified INTEGER NOT NULL,
    operator TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    data TEXT NOT NULL,              -- JSON serialized WipeReport
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_wipe_runs_device ON wipe_runs(device);

-- Signed certificates
CREATE TABLE IF NOT EXISTS certificates (
    uuid TEXT PRIMARY KEY,
    run_id TEXT,
    device TEXT NOT NULL,
    signature TEXT NOT NULL,
    data TEXT NOT NULL,              -- certificate JSON as signed
    verifier_url TEXT NOT NULL,
    json_path TEXT,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (run_id) REFERENCES wipe_runs(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_certificates_run ON certificates(run_id);

-- Append-only audit chain
CREATE TABLE IF NOT EXISTS audit_entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_hash TEXT NOT NULL,
    merkle_root TEXT NOT NULL,
    record TEXT NOT NULL,            -- JSON serialized AuditRecord
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_entries_hash ON audit_entries(audit_hash);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// Migrations from older schema versions.
pub struct Migration {
    /// Version this migration upgrades from.
    pub from_version: u32,
    /// Version this migration upgrades to.
    pub to_version: u32,
    /// SQL statements to execute.
    pub sql: &'static str,
}

/// Available migrations.
pub const MIGRATIONS: &[Migration] = &[];

/// Gets migrations needed to upgrade from a version.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version && m.to_version <= CURRENT_SCHEMA_VERSION)
        .collect()
}
