//! Storage trait definition.
//!
//! Defines the interface for persistent storage backends, enabling
//! pluggable storage implementations.

use crate::cert::issue::IssuedCertificate;
use crate::error::Result;
use crate::wipe::engine::WipeReport;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for persistent storage backends.
///
/// Implementations hold finished runs, issued certificates and the audit
/// chain. All operations should be atomic where appropriate.
pub trait Storage: Send {
    /// Initializes storage (creates schema, runs migrations).
    ///
    /// Should be idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation or migration fails.
    fn init(&mut self) -> Result<()>;

    /// Checks if storage is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Resets all stored state.
    ///
    /// Deletes all data but preserves the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;

    // ==================== Run Operations ====================

    /// Records a finished run. A run with the same job id is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database write fails.
    fn add_run(&mut self, report: &WipeReport) -> Result<()>;

    /// Retrieves a run by job id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or deserialization fails.
    fn get_run(&self, id: &str) -> Result<Option<WipeReport>>;

    /// Lists all runs, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or deserialization fails.
    fn list_runs(&self) -> Result<Vec<WipeReport>>;

    // ==================== Certificate Operations ====================

    /// Records an issued certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be inserted.
    fn add_certificate(&mut self, cert: &StoredCertificate) -> Result<()>;

    /// Retrieves a certificate by UUID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_certificate(&self, uuid: &str) -> Result<Option<StoredCertificate>>;

    /// Lists all certificates, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_certificates(&self) -> Result<Vec<StoredCertificate>>;

    // ==================== Audit Operations ====================

    /// Appends an audit entry and returns its sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be inserted.
    fn append_audit_entry(&mut self, audit_hash: &str, merkle_root: &str, record: &Value) -> Result<i64>;

    /// Lists the audit chain in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_audit_entries(&self) -> Result<Vec<AuditEntry>>;

    /// Merkle root stored with the last audit entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn latest_root(&self) -> Result<Option<String>>;

    // ==================== Utility Operations ====================

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StorageStats>;
}

/// A certificate as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCertificate {
    /// Certificate identifier.
    pub uuid: String,
    /// Run the certificate was issued for. `None` for imported JSON.
    pub run_id: Option<String>,
    /// Device the certificate is about.
    pub device: String,
    /// Base64 signature.
    pub signature: String,
    /// Certificate JSON as signed.
    pub certificate: Value,
    /// Verifier URL or fragment.
    pub verifier_url: String,
    /// Where the certificate JSON was written.
    pub json_path: Option<String>,
    /// Unix timestamp of insertion.
    pub created_at: i64,
}

impl StoredCertificate {
    /// Builds a record from an issued certificate and the JSON that was signed.
    #[must_use]
    pub fn from_issued(issued: &IssuedCertificate, certificate: Value, run_id: Option<String>) -> Self {
        Self {
            uuid: issued.uuid.clone(),
            run_id,
            device: issued.device.clone(),
            signature: issued.signature.clone(),
            certificate,
            verifier_url: issued.verifier_url.clone(),
            json_path: Some(issued.json_path.to_string_lossy().into_owned()),
            created_at: 0,
        }
    }
}

/// One link of the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 1.
    pub seq: i64,
    /// SHA-256 of the canonical record.
    pub audit_hash: String,
    /// Merkle root over every hash up to and including this one.
    pub merkle_root: String,
    /// The audit record.
    pub record: Value,
    /// Unix timestamp of insertion.
    pub created_at: i64,
}

/// Storage statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    /// Number of recorded runs.
    pub run_count: usize,
    /// Runs whose wipe step succeeded.
    pub successful_runs: usize,
    /// Runs that verified clean.
    pub verified_runs: usize,
    /// Number of stored certificates.
    pub certificate_count: usize,
    /// Length of the audit chain.
    pub audit_entries: usize,
    /// Current Merkle root, if the chain is not empty.
    pub latest_root: Option<String>,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
