//! Plain-text certificate sheet.
//!
//! Works on certificate JSON rather than [`crate::cert::record::Certificate`]
//! so certificates produced by other tools render the same way. Missing
//! fields print as empty.

use serde_json::Value;
use std::fmt::Write;

const WIDTH: usize = 72;

type Row = (&'static str, &'static str);

const PERSON: &[Row] = &[
    ("Name", "Name"),
    ("Title", "Title"),
    ("Organization", "Organization"),
    ("Location", "Location"),
    ("Phone", "Phone"),
];

const MEDIA: &[Row] = &[
    ("Make/Vendor", "MakeVendor"),
    ("Model", "Model"),
    ("Serial Number", "SerialNumber"),
    ("Property Number", "MediaPropertyNumber"),
    ("Media Type", "MediaType"),
    ("Source", "Source"),
    ("Classification", "Classification"),
    ("Data Backed Up", "DataBackedUp"),
];

const SANITIZATION: &[Row] = &[
    ("Method Type", "MethodType"),
    ("Method Used", "MethodUsed"),
    ("Number of Passes", "NumberOfPasses"),
    ("Tool Used (version)", "ToolUsed"),
    ("Verification Method", "VerificationMethod"),
    ("Post-Sanitization Classification", "PostSanitizationClassification"),
];

const DESTINATION: &[Row] = &[("Destination", "Option"), ("Details", "Details")];

const EXECUTION: &[Row] = &[
    ("Status", "Status"),
    ("Started", "StartedAt"),
    ("Completed", "CompletedAt"),
    ("Bytes Written", "BytesWritten"),
    ("Verification Digest", "VerificationDigest"),
    ("Tool Hash", "ToolHash"),
];

/// Renders `cert` as a text sheet.
///
/// `verify_target` is the verifier URL or fragment printed at the bottom.
#[must_use]
pub fn render_text(cert: &Value, subtitle: &str, verify_target: &str) -> String {
    let mut out = String::new();
    let rule = "=".repeat(WIDTH);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{:^WIDTH$}", "CERTIFICATE OF SANITIZATION");
    if !subtitle.is_empty() {
        let _ = writeln!(out, "{subtitle:^WIDTH$}");
    }
    let _ = writeln!(out, "{rule}");

    if let Some(uuid) = cert.get("uuid").and_then(Value::as_str) {
        let _ = writeln!(out, "Certificate ID: {uuid}");
    }

    section(&mut out, cert, "PersonPerformingSanitization", "Person Performing Sanitization", PERSON);
    section(&mut out, cert, "MediaInformation", "Media Information", MEDIA);
    section(&mut out, cert, "SanitizationDetails", "Sanitization Details", SANITIZATION);
    section(&mut out, cert, "MediaDestination", "Media Destination", DESTINATION);
    if cert.get("Execution").is_some() {
        section(&mut out, cert, "Execution", "Execution", EXECUTION);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Scan or open to verify:");
    let _ = writeln!(out, "{verify_target}");
    let _ = writeln!(out, "{rule}");
    out
}

fn section(out: &mut String, cert: &Value, key: &str, title: &str, rows: &[Row]) {
    let data = cert.get(key);
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
    let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    for (label, field) in rows {
        let value = data.and_then(|d| d.get(*field)).map(display).unwrap_or_default();
        let _ = writeln!(out, "{:<label_width$} {value}", format!("{label}:"));
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
