//! Append-only audit chain over storage.
//!
//! Each entry stores its audit hash and the Merkle root over every hash up to
//! and including it. Changing any stored record changes its recomputed hash,
//! and so every later root.

use crate::audit::merkle::compute_merkle_root;
use crate::audit::record::{AuditRecord, hash_value};
use crate::error::{AuditError, Result, StorageError};
use crate::io::write_file;
use crate::storage::Storage;
use serde::Serialize;
use std::path::Path;

/// Result of appending a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendedEntry {
    /// Sequence number of the new entry.
    pub seq: i64,
    /// Hash of the record.
    pub audit_hash: String,
    /// Root before the append (`GENESIS_BLOCK` for the first entry).
    pub previous_root: String,
    /// Root after the append.
    pub merkle_root: String,
}

/// Result of a successful chain check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    /// Number of entries checked.
    pub entries: usize,
    /// Recomputed root.
    pub root: String,
}

/// Marker recorded as the previous root of the first entry.
pub const GENESIS_ROOT: &str = "GENESIS_BLOCK";

/// Audit chain backed by a [`Storage`].
pub struct AuditChain<'a> {
    storage: &'a mut dyn Storage,
}

impl<'a> AuditChain<'a> {
    /// Wraps a storage backend.
    pub fn new(storage: &'a mut dyn Storage) -> Self {
        Self { storage }
    }

    /// Appends `record` and returns the new root.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or stored.
    pub fn append(&mut self, record: &AuditRecord) -> Result<AppendedEntry> {
        let value = serde_json::to_value(record).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let audit_hash = hash_value(&value);

        let mut hashes = self.hashes()?;
        let previous_root = self
            .storage
            .latest_root()?
            .unwrap_or_else(|| GENESIS_ROOT.to_string());
        hashes.push(audit_hash.clone());
        let merkle_root = compute_merkle_root(&hashes);

        let seq = self.storage.append_audit_entry(&audit_hash, &merkle_root, &value)?;
        tracing::info!(seq, hash = %audit_hash, root = %merkle_root, "audit entry appended");
        Ok(AppendedEntry {
            seq,
            audit_hash,
            previous_root,
            merkle_root,
        })
    }

    /// Stored audit hashes in order.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn hashes(&self) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list_audit_entries()?
            .into_iter()
            .map(|e| e.audit_hash)
            .collect())
    }

    /// Merkle root over the stored hashes.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn root(&self) -> Result<String> {
        Ok(compute_merkle_root(&self.hashes()?))
    }

    /// Recomputes every hash and rolling root.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::ChainBroken`] with the first entry whose record
    /// hash or stored root does not match.
    pub fn verify(&self) -> Result<ChainStatus> {
        let entries = self.storage.list_audit_entries()?;
        let mut hashes = Vec::with_capacity(entries.len());
        for entry in &entries {
            let recomputed = hash_value(&entry.record);
            if recomputed != entry.audit_hash {
                tracing::warn!(seq = entry.seq, "audit record hash mismatch");
                return Err(AuditError::ChainBroken { seq: entry.seq }.into());
            }
            hashes.push(recomputed);
            if compute_merkle_root(&hashes) != entry.merkle_root {
                tracing::warn!(seq = entry.seq, "audit root mismatch");
                return Err(AuditError::ChainBroken { seq: entry.seq }.into());
            }
        }
        Ok(ChainStatus {
            entries: entries.len(),
            root: compute_merkle_root(&hashes),
        })
    }

    /// Writes the hashes to `path`, one per line.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or the file cannot be written.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let text = self.export_text()?;
        write_file(path, &text)?;
        Ok(text.lines().count())
    }

    /// The hashes, one per line.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn export_text(&self) -> Result<String> {
        Ok(self
            .hashes()?
            .iter()
            .map(|h| format!("{h}\n"))
            .collect())
    }
}

/// Reads an exported hash list. Blank lines are ignored.
#[must_use]
pub fn import_hashes(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
