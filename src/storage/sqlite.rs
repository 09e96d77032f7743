//! `SQLite` storage implementation.
//!
//! Provides persistent storage using `SQLite` with proper transaction
//! management and migration support.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{AuditEntry, Storage, StorageStats, StoredCertificate};
use crate::wipe::engine::WipeReport;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// SQLite-based storage implementation.
///
/// # Examples
///
/// ```no_run
/// use nullwipe::storage::{SqliteStorage, Storage};
///
/// let mut storage = SqliteStorage::open(".nullwipe/nullwipe.db").unwrap();
/// storage.init().unwrap();
/// ```
pub struct SqliteStorage {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database file. Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        // journal_mode returns the new mode as a row
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory `SQLite` database.
    ///
    /// Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        Ok(Self { conn, path: None })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Gets the current schema version.
    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;

        Ok(version.and_then(|v| v.parse().ok()))
    }

    /// Sets the schema version.
    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    /// Returns current Unix timestamp.
    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Runs raw SQL. Tests use it to tamper with stored rows.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<usize> {
        Ok(self.conn.execute(sql, []).map_err(StorageError::from)?)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text).map_err(StorageError::from)?)
}

const CERT_COLUMNS: &str =
    "uuid, run_id, device, signature, data, verifier_url, json_path, created_at";

/// Raw certificate row; JSON is parsed outside the rusqlite closure.
type CertRow = (String, Option<String>, String, String, String, String, Option<String>, i64);

fn cert_row(row: &Row<'_>) -> rusqlite::Result<CertRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn cert_from_row(raw: CertRow) -> Result<StoredCertificate> {
    let (uuid, run_id, device, signature, data, verifier_url, json_path, created_at) = raw;
    Ok(StoredCertificate {
        uuid,
        run_id,
        device,
        signature,
        certificate: parse_json(&data)?,
        verifier_url,
        json_path,
        created_at,
    })
}

impl Storage for SqliteStorage {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if let Some(current) = self.get_schema_version()?
            && current < CURRENT_SCHEMA_VERSION
        {
            for migration in crate::storage::schema::get_migrations_from(current) {
                self.conn
                    .execute_batch(migration.sql)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
            }
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn reset(&mut self) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        tx.execute_batch(
            r"
            DELETE FROM certificates;
            DELETE FROM wipe_runs;
            DELETE FROM audit_entries;
            DELETE FROM sqlite_sequence WHERE name = 'audit_entries';
        ",
        )
        .map_err(StorageError::from)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(())
    }

    // ==================== Run Operations ====================

    fn add_run(&mut self, report: &WipeReport) -> Result<()> {
        let data = serde_json::to_string(report).map_err(StorageError::from)?;
        self.conn
            .execute(
                r"
            INSERT OR REPLACE INTO wipe_runs (
                id, device, kind, method, status, success, verified, operator,
                started_at, completed_at, data, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
                params![
                    report.job.id.to_string(),
                    report.job.device.path,
                    report.job.device.kind.as_str(),
                    report.effective_method.as_str(),
                    report.status,
                    report.success,
                    report.verified_clean,
                    report.system_metadata.operator,
                    report.started_at.to_rfc3339(),
                    report.completed_at.to_rfc3339(),
                    data,
                    Self::now(),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn get_run(&self, id: &str) -> Result<Option<WipeReport>> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM wipe_runs WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(StorageError::from)?;

        data.map(|json| parse_json(&json)).transpose()
    }

    fn list_runs(&self) -> Result<Vec<WipeReport>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM wipe_runs ORDER BY started_at, rowid")
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        rows.iter().map(|json| parse_json(json)).collect()
    }

    // ==================== Certificate Operations ====================

    fn add_certificate(&mut self, cert: &StoredCertificate) -> Result<()> {
        let data = serde_json::to_string(&cert.certificate).map_err(StorageError::from)?;
        self.conn
            .execute(
                r"
            INSERT OR REPLACE INTO certificates (
                uuid, run_id, device, signature, data, verifier_url, json_path, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
                params![
                    cert.uuid,
                    cert.run_id,
                    cert.device,
                    cert.signature,
                    data,
                    cert.verifier_url,
                    cert.json_path,
                    Self::now(),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn get_certificate(&self, uuid: &str) -> Result<Option<StoredCertificate>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {CERT_COLUMNS} FROM certificates WHERE uuid = ?"),
                params![uuid],
                cert_row,
            )
            .optional()
            .map_err(StorageError::from)?;

        raw.map(cert_from_row).transpose()
    }

    fn list_certificates(&self) -> Result<Vec<StoredCertificate>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {CERT_COLUMNS} FROM certificates ORDER BY created_at, rowid"
            ))
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map([], cert_row)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        rows.into_iter().map(cert_from_row).collect()
    }

    // ==================== Audit Operations ====================

    fn append_audit_entry(&mut self, audit_hash: &str, merkle_root: &str, record: &Value) -> Result<i64> {
        let data = serde_json::to_string(record).map_err(StorageError::from)?;
        self.conn
            .execute(
                r"
            INSERT INTO audit_entries (audit_hash, merkle_root, record, created_at)
            VALUES (?, ?, ?, ?)
        ",
                params![audit_hash, merkle_root, data, Self::now()],
            )
            .map_err(StorageError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_audit_entries(&self) -> Result<Vec<AuditEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT seq, audit_hash, merkle_root, record, created_at FROM audit_entries ORDER BY seq",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|(seq, audit_hash, merkle_root, record, created_at)| {
                Ok(AuditEntry {
                    seq,
                    audit_hash,
                    merkle_root,
                    record: parse_json(&record)?,
                    created_at,
                })
            })
            .collect()
    }

    fn latest_root(&self) -> Result<Option<String>> {
        let root = self
            .conn
            .query_row(
                "SELECT merkle_root FROM audit_entries ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(root)
    }

    // ==================== Utility Operations ====================

    fn stats(&self) -> Result<StorageStats> {
        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(StorageStats {
            run_count: self.count("SELECT COUNT(*) FROM wipe_runs")?,
            successful_runs: self.count("SELECT COUNT(*) FROM wipe_runs WHERE success = 1")?,
            verified_runs: self.count("SELECT COUNT(*) FROM wipe_runs WHERE verified = 1")?,
            certificate_count: self.count("SELECT COUNT(*) FROM certificates")?,
            audit_entries: self.count("SELECT COUNT(*) FROM audit_entries")?,
            latest_root: self.latest_root()?,
            schema_version: self.get_schema_version()?.unwrap_or(0),
            db_size,
        })
    }
}
