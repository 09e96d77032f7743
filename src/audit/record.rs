//! Audit records for finished runs.

use crate::audit::attest::AttestationResult;
use crate::audit::merkle::sha256_hex;
use crate::cert::canonical::{canonical_json, canonical_json_of};
use crate::error::Result;
use crate::wipe::engine::WipeReport;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format version written into every record.
pub const AUDIT_VERSION: &str = "1.0";

/// Wipe outcome as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WipeStatus {
    /// Wipe step succeeded.
    Success,
    /// Wipe step failed or was cancelled.
    Failure,
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Device path or identifier.
    pub device_id: String,
    /// Attestation checks, when they ran.
    pub zta_results: Option<AttestationResult>,
    /// Outcome of the wipe step.
    pub wipe_status: WipeStatus,
    /// Verification digest, or the hash of the certificate.
    pub final_verification_hash: String,
    /// RFC 3339 time the record was made.
    pub timestamp: String,
    /// Record format version.
    pub audit_version: String,
    /// Whether attestation ran and passed.
    pub operator_attestation: bool,
    /// Certificate issued for the run.
    pub certificate_uuid: Option<String>,
}

impl AuditRecord {
    /// Builds the record for a finished run.
    ///
    /// `certificate` is the signed certificate JSON, if one was issued.
    #[must_use]
    pub fn from_report(report: &WipeReport, certificate: Option<&Value>) -> Self {
        let final_verification_hash = report
            .verification
            .as_ref()
            .map(|v| v.digest.clone())
            .or_else(|| certificate.map(|cert| sha256_hex(&canonical_json(cert))))
            .unwrap_or_else(|| {
                let fallback = serde_json::json!({"job": report.job.id.to_string(), "status": report.status});
                sha256_hex(&canonical_json(&fallback))
            });

        Self {
            device_id: report.job.device.path.clone(),
            zta_results: report.attestation.clone(),
            wipe_status: if report.success {
                WipeStatus::Success
            } else {
                WipeStatus::Failure
            },
            final_verification_hash,
            timestamp: report.completed_at.to_rfc3339(),
            audit_version: AUDIT_VERSION.to_string(),
            operator_attestation: report.attestation.as_ref().is_some_and(AttestationResult::passed),
            certificate_uuid: report.certificate.as_ref().map(|c| c.uuid.clone()),
        }
    }

    /// SHA-256 of the canonical JSON of this record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn audit_hash(&self) -> Result<String> {
        Ok(sha256_hex(&canonical_json_of(self)?))
    }
}

/// Audit hash of a stored record.
#[must_use]
pub fn hash_value(record: &Value) -> String {
    sha256_hex(&canonical_json(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{Device, DeviceKind, DeviceMetadata, SystemMetadata};
    use crate::core::job::WipeJob;
    use crate::core::method::{NistCategory, VerifyMode, WipeMethod};
    use crate::verify::VerificationReport;
    use chrono::Utc;
    use serde_json::json;

    fn report(success: bool, digest: Option<&str>) -> WipeReport {
        WipeReport {
            job: WipeJob::new(Device::new("/dev/sdb", DeviceKind::Ata), WipeMethod::Zero, VerifyMode::Sampled),
            device_metadata: DeviceMetadata::default(),
            system_metadata: SystemMetadata::default(),
            attestation: None,
            status: "zero_fill_ok".to_string(),
            success,
            verified_clean: digest.is_some(),
            effective_method: WipeMethod::Zero,
            category: NistCategory::Clear,
            passes: 1,
            bytes_written: 1024,
            verification: digest.map(|d| VerificationReport {
                mode: VerifyMode::Sampled,
                passed: true,
                samples: 2,
                bytes_checked: 1024,
                first_mismatch: None,
                digest: d.to_string(),
            }),
            log_path: None,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            certificate: None,
        }
    }

    #[test]
    fn test_digest_preferred() {
        let record = AuditRecord::from_report(&report(true, Some("abc123")), Some(&json!({"uuid": "x"})));
        assert_eq!(record.final_verification_hash, "abc123");
        assert_eq!(record.wipe_status, WipeStatus::Success);
        assert_eq!(record.audit_version, "1.0");
        assert!(!record.operator_attestation);
    }

    #[test]
    fn test_certificate_hash_fallback() {
        let cert = json!({"uuid": "x", "device": "/dev/sdb"});
        let record = AuditRecord::from_report(&report(false, None), Some(&cert));
        assert_eq!(record.final_verification_hash, sha256_hex(&canonical_json(&cert)));
        assert_eq!(record.wipe_status, WipeStatus::Failure);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let record = AuditRecord::from_report(&report(true, None), None);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["wipe_status"], "SUCCESS");
        assert_eq!(value["final_verification_hash"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_hash_matches_stored_value() {
        let record = AuditRecord::from_report(&report(true, Some("d1")), None);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(record.audit_hash().unwrap(), hash_value(&value));

        let mut tampered = value;
        tampered["wipe_status"] = json!("FAILURE");
        assert_ne!(record.audit_hash().unwrap(), hash_value(&tampered));
    }
}
