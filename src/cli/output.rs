//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::audit::attest::AttestationResult;
use crate::audit::chain::{AppendedEntry, ChainStatus};
use crate::cert::issue::IssuedCertificate;
use crate::cert::sign::KeyPaths;
use crate::cert::verifier::VerifyOutcome;
use crate::core::device::Device;
use crate::core::method::{NistCategory, WipeMethod};
use crate::error::Error;
use crate::storage::traits::{AuditEntry, StorageStats, StoredCertificate};
use crate::wipe::engine::{WipePlan, WipeReport};
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// A probed device with the methods that apply to it.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRow {
    /// Probed device.
    pub device: Device,
    /// Applicable methods, default first.
    pub methods: Vec<WipeMethod>,
}

/// A method with its description.
#[derive(Debug, Clone, Serialize)]
pub struct MethodRow {
    /// Method identifier.
    pub method: WipeMethod,
    /// Display name.
    pub label: &'static str,
    /// NIST category.
    pub category: NistCategory,
    /// Description.
    pub description: &'static str,
}

/// Result of one wipe target.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Target as given on the command line.
    pub target: String,
    /// Run report, when the run got that far.
    pub report: Option<WipeReport>,
    /// Audit chain entry for the run.
    pub audit: Option<AppendedEntry>,
    /// Error that stopped the run.
    pub error: Option<String>,
}

/// Formats a status response.
#[must_use]
pub fn format_status(stats: &StorageStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json => format_json(stats),
    }
}

fn format_status_text(stats: &StorageStats) -> String {
    let mut output = String::new();
    output.push_str("nullwipe Status\n");
    output.push_str("===============\n\n");
    let _ = writeln!(output, "  Runs:          {}", stats.run_count);
    let _ = writeln!(output, "  Successful:    {}", stats.successful_runs);
    let _ = writeln!(output, "  Verified:      {}", stats.verified_runs);
    let _ = writeln!(output, "  Certificates:  {}", stats.certificate_count);
    let _ = writeln!(output, "  Audit entries: {}", stats.audit_entries);
    let _ = writeln!(
        output,
        "  Merkle root:   {}",
        stats.latest_root.as_deref().unwrap_or("-")
    );
    let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:       {}", format_size(size));
    }
    output
}

/// Formats the device list.
#[must_use]
pub fn format_devices(rows: &[DeviceRow], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&rows),
        OutputFormat::Text => {
            if rows.is_empty() {
                return "No block devices found.\n".to_string();
            }
            let mut output = String::new();
            let _ = writeln!(
                output,
                "{:<16} {:<8} {:<10} {:<24} Methods",
                "Device", "Kind", "Size", "Model"
            );
            output.push_str(&"-".repeat(78));
            output.push('\n');
            for row in rows {
                let methods: Vec<&str> = row.methods.iter().map(|m| m.as_str()).collect();
                let _ = writeln!(
                    output,
                    "{:<16} {:<8} {:<10} {:<24} {}",
                    truncate(&row.device.path, 16),
                    row.device.kind.as_str(),
                    format_size(row.device.size_bytes),
                    truncate(row.device.model.as_deref().unwrap_or("-"), 24),
                    methods.join(", ")
                );
            }
            output
        }
    }
}

/// Formats the method table.
#[must_use]
pub fn format_methods(rows: &[MethodRow], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&rows),
        OutputFormat::Text => {
            let mut output = String::new();
            for row in rows {
                let _ = writeln!(
                    output,
                    "{:<8} {:<6} {}",
                    row.method.as_str(),
                    row.category.to_string(),
                    row.label
                );
                let _ = writeln!(output, "         {}", row.description);
            }
            output
        }
    }
}

/// Formats dry-run plans.
#[must_use]
pub fn format_plans(plans: &[WipePlan], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&plans),
        OutputFormat::Text => {
            let mut output = String::new();
            for plan in plans {
                let _ = writeln!(output, "Plan for {} ({}):", plan.device.path, plan.device.kind);
                let _ = writeln!(output, "  Requested:    {}", plan.requested);
                let _ = writeln!(output, "  Effective:    {} [{}]", plan.effective, plan.wiper);
                let _ = writeln!(output, "  Verification: {}", plan.verify_mode);
                for note in &plan.notes {
                    let _ = writeln!(output, "  Note:         {note}");
                }
            }
            output.push_str("Dry run: nothing was written.\n");
            output
        }
    }
}

/// Formats wipe results.
#[must_use]
pub fn format_run_results(results: &[RunResult], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&results),
        OutputFormat::Text => {
            let mut output = String::new();
            for result in results {
                let _ = writeln!(output, "{}:", result.target);
                if let Some(error) = &result.error {
                    let _ = writeln!(output, "  Error:        {error}");
                    continue;
                }
                let Some(report) = &result.report else {
                    continue;
                };
                let _ = writeln!(output, "  Job:          {}", report.job.id);
                let _ = writeln!(
                    output,
                    "  Result:       {} ({})",
                    if report.success { "SUCCESS" } else { "FAILURE" },
                    report.status
                );
                let _ = writeln!(
                    output,
                    "  Method:       {} ({}), {} pass(es)",
                    report.effective_method, report.category, report.passes
                );
                match &report.verification {
                    Some(v) => {
                        let _ = writeln!(
                            output,
                            "  Verification: {} {}",
                            v.mode,
                            if v.passed { "passed" } else { "FAILED" }
                        );
                    }
                    None => {
                        let _ = writeln!(output, "  Verification: none");
                    }
                }
                if let Some(log) = &report.log_path {
                    let _ = writeln!(output, "  Log:          {}", log.display());
                }
                if let Some(cert) = &report.certificate {
                    let _ = writeln!(output, "  Certificate:  {}", cert.json_path.display());
                    let _ = writeln!(output, "  Verify at:    {}", truncate(&cert.verifier_url, 60));
                }
                if let Some(audit) = &result.audit {
                    let _ = writeln!(output, "  Audit entry:  #{} root {}", audit.seq, audit.merkle_root);
                }
            }
            output
        }
    }
}

/// Formats generated key paths.
#[must_use]
pub fn format_keygen(paths: &KeyPaths, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&serde_json::json!({
            "private_key": paths.private,
            "public_key": paths.public,
        })),
        OutputFormat::Text => format!(
            "Generated signing key pair:\n  Private: {}\n  Public:  {}\n",
            paths.private.display(),
            paths.public.display()
        ),
    }
}

/// Formats an issued certificate.
#[must_use]
pub fn format_issued(issued: &IssuedCertificate, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(issued),
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Certificate {} issued for {}", issued.uuid, issued.device);
            let _ = writeln!(output, "  JSON:      {}", issued.json_path.display());
            let _ = writeln!(output, "  Signature: {}", issued.signature_path.display());
            let _ = writeln!(output, "  Envelope:  {}", issued.envelope_path.display());
            let _ = writeln!(output, "  Sheet:     {}", issued.text_path.display());
            if let Some(hosted) = &issued.hosted_url {
                let _ = writeln!(output, "  Hosted:    {hosted}");
            }
            let _ = writeln!(output, "  Verify at: {}", issued.verifier_url);
            output
        }
    }
}

/// Formats a verification outcome.
#[must_use]
pub fn format_verify(outcome: &VerifyOutcome, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(outcome),
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(
                output,
                "Signature: {}",
                if outcome.valid { "VALID" } else { "INVALID" }
            );
            let _ = writeln!(output, "  Certificate: {}", outcome.uuid.as_deref().unwrap_or("-"));
            let _ = writeln!(output, "  Device:      {}", outcome.device.as_deref().unwrap_or("-"));
            output
        }
    }
}

/// Formats the certificate list.
#[must_use]
pub fn format_certificates(certs: &[StoredCertificate], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&certs),
        OutputFormat::Text => {
            if certs.is_empty() {
                return "No certificates found.\n".to_string();
            }
            let mut output = String::new();
            let _ = writeln!(output, "{:<38} {:<16} {:<14} Run", "UUID", "Device", "Classification");
            output.push_str(&"-".repeat(78));
            output.push('\n');
            for cert in certs {
                let classification = cert
                    .certificate
                    .pointer("/SanitizationDetails/PostSanitizationClassification")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("-");
                let _ = writeln!(
                    output,
                    "{:<38} {:<16} {:<14} {}",
                    cert.uuid,
                    truncate(&cert.device, 16),
                    classification,
                    cert.run_id.as_deref().map_or("-", |r| truncate_str(r, 8))
                );
            }
            output
        }
    }
}

/// Formats one stored certificate.
#[must_use]
pub fn format_certificate(cert: &StoredCertificate, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(cert),
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Certificate: {}", cert.uuid);
            let _ = writeln!(output, "  Device:     {}", cert.device);
            let _ = writeln!(output, "  Run:        {}", cert.run_id.as_deref().unwrap_or("-"));
            if let Some(path) = &cert.json_path {
                let _ = writeln!(output, "  File:       {path}");
            }
            let _ = writeln!(output, "  Signature:  {}", cert.signature);
            let _ = writeln!(output, "  Verify at:  {}", cert.verifier_url);
            output.push('\n');
            output.push_str(&format_json(&cert.certificate));
            output.push('\n');
            output
        }
    }
}

/// Formats an attestation result.
#[must_use]
pub fn format_attestation(result: &AttestationResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(result),
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Attestation for {}", result.device_id);
            let _ = writeln!(output, "  Operator:       {}", result.operator_id);
            let _ = writeln!(
                output,
                "  Forensic tools: {}",
                if result.forensic_tool_detected {
                    format!("FAIL ({})", result.detected_tools.join(", "))
                } else {
                    "PASS".to_string()
                }
            );
            let _ = writeln!(
                output,
                "  Policy:         {}",
                if result.policy_check { "PASS" } else { "FAIL" }
            );
            let _ = writeln!(
                output,
                "  Result:         {}",
                if result.passed() { "PASSED" } else { "DENIED" }
            );
            output
        }
    }
}

/// Formats the audit chain.
#[must_use]
pub fn format_audit_log(entries: &[AuditEntry], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&entries),
        OutputFormat::Text => {
            if entries.is_empty() {
                return "Audit chain is empty.\n".to_string();
            }
            let mut output = String::new();
            let _ = writeln!(output, "{:<5} {:<18} {:<8} {:<18} Device", "Seq", "Hash", "Status", "Root");
            output.push_str(&"-".repeat(78));
            output.push('\n');
            for entry in entries {
                let field = |name: &str| {
                    entry
                        .record
                        .get(name)
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("-")
                        .to_string()
                };
                let _ = writeln!(
                    output,
                    "{:<5} {:<18} {:<8} {:<18} {}",
                    entry.seq,
                    truncate(&entry.audit_hash, 18),
                    field("wipe_status"),
                    truncate(&entry.merkle_root, 18),
                    field("device_id")
                );
            }
            output
        }
    }
}

/// Formats a Merkle root.
#[must_use]
pub fn format_root(root: &str, entries: usize, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&serde_json::json!({"root": root, "entries": entries})),
        OutputFormat::Text => format!("Merkle root over {entries} entr{}: {root}\n", if entries == 1 { "y" } else { "ies" }),
    }
}

/// Formats a chain check.
#[must_use]
pub fn format_chain_status(status: &ChainStatus, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(status),
        OutputFormat::Text => format!(
            "Audit chain intact: {} entries, root {}\n",
            status.entries, status.root
        ),
    }
}

/// Formats an error for output.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => format_json(&serde_json::json!({
            "error": error.to_string(),
        })),
    }
}

/// Formats a value as JSON.
fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Cuts a string at `max_len` characters without an ellipsis.
fn truncate_str(s: &str, max_len: usize) -> &str {
    s.char_indices().nth(max_len).map_or(s, |(i, _)| &s[..i])
}
