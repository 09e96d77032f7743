//! Storage layer for nullwipe.
//!
//! Persists finished runs, issued certificates and the audit chain in
//! `SQLite`.

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{AuditEntry, Storage, StorageStats, StoredCertificate};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "nullwipe.db";

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".nullwipe/nullwipe.db";
