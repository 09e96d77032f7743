//! Certificate of sanitization.
//!
//! Section and field names follow the NIST SP 800-88 sample certificate and
//! are serialized in PascalCase. Field values are strings so certificates
//! from other tools that use the same schema sign and verify identically.

use crate::config::CertificateSettings;
use crate::core::method::{NistCategory, VerifyMode};
use crate::wipe::engine::WipeReport;
use serde::{Deserialize, Serialize};

/// Tool name recorded on every certificate.
pub const TOOL_NAME: &str = "NIST-Aware Wiper";

/// Person performing sanitization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    /// Operator name.
    pub name: String,
    /// Operator title.
    pub title: String,
    /// Host name of the sanitizing system.
    pub organization: String,
    /// Operating system of the sanitizing system.
    pub location: String,
    /// Contact number.
    pub phone: String,
}

/// Sanitized media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaInformation {
    /// Manufacturer, falling back to the model.
    pub make_vendor: String,
    /// Model.
    pub model: String,
    /// Serial number.
    pub serial_number: String,
    /// Asset tag.
    pub media_property_number: String,
    /// Interface, e.g. `NVME`.
    pub media_type: String,
    /// Device path.
    pub source: String,
    /// Classification before sanitization.
    pub classification: String,
    /// Whether data was backed up.
    pub data_backed_up: String,
}

/// How the media was sanitized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SanitizationDetails {
    /// `Clear` or `Purge`.
    pub method_type: String,
    /// Method identifier.
    pub method_used: String,
    /// Passes completed.
    pub number_of_passes: String,
    /// Tool and version.
    pub tool_used: String,
    /// Verification depth.
    pub verification_method: String,
    /// `Unclassified`, `Unverified` or `Failed`.
    pub post_sanitization_classification: String,
}

/// What happens to the media next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaDestination {
    /// `Reuse` or `Destroy`.
    pub option: String,
    /// Free text, the log file location.
    pub details: String,
}

/// Execution data of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Execution {
    /// Wipe status code.
    pub status: String,
    /// RFC 3339 start time.
    pub started_at: String,
    /// RFC 3339 end time.
    pub completed_at: String,
    /// Bytes written natively.
    pub bytes_written: u64,
    /// SHA-256 of the bytes read during verification.
    pub verification_digest: Option<String>,
    /// SHA-256 of the executable that ran the wipe.
    pub tool_hash: Option<String>,
}

/// A certificate of sanitization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Certificate identifier (the job id).
    pub uuid: String,
    /// Device path or identifier.
    pub device: String,
    /// Person section.
    #[serde(rename = "PersonPerformingSanitization")]
    pub person: Person,
    /// Media section.
    #[serde(rename = "MediaInformation")]
    pub media: MediaInformation,
    /// Sanitization section.
    #[serde(rename = "SanitizationDetails")]
    pub sanitization: SanitizationDetails,
    /// Destination section.
    #[serde(rename = "MediaDestination")]
    pub destination: MediaDestination,
    /// Execution section.
    #[serde(rename = "Execution")]
    pub execution: Execution,
}

impl Certificate {
    /// Builds the certificate for a finished run.
    #[must_use]
    pub fn from_report(report: &WipeReport, settings: &CertificateSettings) -> Self {
        let meta = &report.device_metadata;
        let sys = &report.system_metadata;

        let verification_method = report
            .verification
            .as_ref()
            .map_or(VerifyMode::None, |v| v.mode);
        let post_classification = if report.verified_clean {
            "Unclassified"
        } else if report.success && report.verification.is_none() {
            "Unverified"
        } else {
            "Failed"
        };
        let method_type = if report.success && report.category == NistCategory::Purge {
            NistCategory::Purge
        } else {
            NistCategory::Clear
        };
        let log_file = report
            .log_path
            .as_ref()
            .map_or_else(|| "none".to_string(), |p| p.display().to_string());

        Self {
            uuid: report.job.id.to_string(),
            device: report.job.device.path.clone(),
            person: Person {
                name: sys.operator.clone(),
                title: settings.title.clone(),
                organization: sys.hostname.clone(),
                location: sys.os.clone(),
                phone: String::new(),
            },
            media: MediaInformation {
                make_vendor: if meta.vendor.is_empty() {
                    meta.model.clone()
                } else {
                    meta.vendor.clone()
                },
                model: meta.model.clone(),
                serial_number: meta.serial.clone(),
                media_property_number: String::new(),
                media_type: meta.interface.clone(),
                source: report.job.device.path.clone(),
                classification: settings.classification.clone(),
                data_backed_up: settings.data_backed_up.clone(),
            },
            sanitization: SanitizationDetails {
                method_type: method_type.to_string(),
                method_used: report.effective_method.to_string(),
                number_of_passes: report.passes.to_string(),
                tool_used: tool_used(),
                verification_method: verification_method.to_string(),
                post_sanitization_classification: post_classification.to_string(),
            },
            destination: MediaDestination {
                option: if report.verified_clean { "Reuse" } else { "Destroy" }.to_string(),
                details: format!("Log file: {log_file}"),
            },
            execution: Execution {
                status: report.status.clone(),
                started_at: report.started_at.to_rfc3339(),
                completed_at: report.completed_at.to_rfc3339(),
                bytes_written: report.bytes_written,
                verification_digest: report.verification.as_ref().map(|v| v.digest.clone()),
                tool_hash: tool_hash(),
            },
        }
    }
}

/// `NIST-Aware Wiper v<version>`.
#[must_use]
pub fn tool_used() -> String {
    format!("{TOOL_NAME} v{}", env!("CARGO_PKG_VERSION"))
}

/// SHA-256 of the running executable.
#[must_use]
pub fn tool_hash() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    crate::io::sha256_file(exe).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{Device, DeviceKind, DeviceMetadata, SystemMetadata};
    use crate::core::job::WipeJob;
    use crate::core::method::WipeMethod;
    use crate::verify::VerificationReport;
    use chrono::Utc;
    use std::path::PathBuf;

    fn report(success: bool, verified: Option<bool>, category: NistCategory) -> WipeReport {
        let device = Device::new("/dev/sdb", DeviceKind::Usb);
        WipeReport {
            job: WipeJob::new(device, WipeMethod::Zero, VerifyMode::Sampled),
            device_metadata: DeviceMetadata {
                device: "/dev/sdb".to_string(),
                model: "Cruzer Blade".to_string(),
                serial: "4C530001".to_string(),
                interface: "USB".to_string(),
                ..DeviceMetadata::default()
            },
            system_metadata: SystemMetadata {
                hostname: "wipebench".to_string(),
                os: "Linux".to_string(),
                kernel: "6.8".to_string(),
                operator: "alice".to_string(),
            },
            attestation: None,
            status: "zero_fill_ok".to_string(),
            success,
            verified_clean: verified == Some(true),
            effective_method: WipeMethod::Zero,
            category,
            passes: 1,
            bytes_written: 4096,
            verification: verified.map(|passed| VerificationReport {
                mode: VerifyMode::Sampled,
                passed,
                samples: 16,
                bytes_checked: 65_536,
                first_mismatch: None,
                digest: "ab".repeat(32),
            }),
            log_path: Some(PathBuf::from("/var/log/nullwipe/wipe_sdb_1.log")),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            certificate: None,
        }
    }

    #[test]
    fn test_verified_clean_certificate() {
        let cert = Certificate::from_report(&report(true, Some(true), NistCategory::Clear), &CertificateSettings::default());
        assert_eq!(cert.person.name, "alice");
        assert_eq!(cert.person.title, "System Operator");
        assert_eq!(cert.person.organization, "wipebench");
        assert_eq!(cert.media.make_vendor, "Cruzer Blade");
        assert_eq!(cert.media.media_type, "USB");
        assert_eq!(cert.sanitization.method_type, "Clear");
        assert_eq!(cert.sanitization.verification_method, "sampled");
        assert_eq!(cert.sanitization.post_sanitization_classification, "Unclassified");
        assert_eq!(cert.destination.option, "Reuse");
        assert_eq!(cert.destination.details, "Log file: /var/log/nullwipe/wipe_sdb_1.log");
        assert!(cert.sanitization.tool_used.starts_with("NIST-Aware Wiper v"));
    }

    #[test]
    fn test_unverified_and_failed() {
        let settings = CertificateSettings::default();
        let unverified = Certificate::from_report(&report(true, None, NistCategory::Clear), &settings);
        assert_eq!(unverified.sanitization.post_sanitization_classification, "Unverified");
        assert_eq!(unverified.destination.option, "Destroy");

        let failed = Certificate::from_report(&report(false, None, NistCategory::Purge), &settings);
        assert_eq!(failed.sanitization.post_sanitization_classification, "Failed");
        assert_eq!(failed.sanitization.method_type, "Clear");

        let mismatch = Certificate::from_report(&report(true, Some(false), NistCategory::Clear), &settings);
        assert_eq!(mismatch.sanitization.post_sanitization_classification, "Failed");
    }

    #[test]
    fn test_purge_only_on_success() {
        let cert = Certificate::from_report(&report(true, Some(true), NistCategory::Purge), &CertificateSettings::default());
        assert_eq!(cert.sanitization.method_type, "Purge");
    }

    #[test]
    fn test_pascal_case_keys() {
        let cert = Certificate::from_report(&report(true, Some(true), NistCategory::Clear), &CertificateSettings::default());
        let value = serde_json::to_value(&cert).unwrap();
        assert!(value["PersonPerformingSanitization"]["Name"].is_string());
        assert!(value["MediaInformation"]["MakeVendor"].is_string());
        assert!(value["SanitizationDetails"]["PostSanitizationClassification"].is_string());
        assert!(value["MediaDestination"]["Option"].is_string());
        assert_eq!(value["Execution"]["BytesWritten"], 4096);
        assert!(value["uuid"].is_string());
    }
}
