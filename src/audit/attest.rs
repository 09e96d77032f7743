//! Zero-trust attestation before a wipe.
//!
//! Three checks: the operator is named, no forensic tool is running, and the
//! media is approved by policy.

use crate::config::AttestationSettings;
use crate::core::device::DeviceKind;
use crate::error::{AuditError, Result};
use crate::system::host::ProcessSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device id markers approved regardless of the probed kind.
const APPROVED_ID_MARKERS: [&str; 3] = ["SSD", "HDD", "USB"];

/// Outcome of the pre-wipe checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationResult {
    /// Operator who asked for the wipe.
    pub operator_id: String,
    /// Whether a forensic tool was found running.
    pub forensic_tool_detected: bool,
    /// Offending process names.
    pub detected_tools: Vec<String>,
    /// Whether the media is approved.
    pub policy_check: bool,
    /// When the checks ran.
    pub timestamp: DateTime<Utc>,
    /// Device the checks were for.
    pub device_id: String,
}

impl AttestationResult {
    /// Whether every check passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        !self.forensic_tool_detected && self.policy_check
    }

    /// Turns a failed check into an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::AttestationDenied`] when a forensic tool is
    /// running or the media is not approved.
    pub fn enforce(&self) -> Result<()> {
        if self.forensic_tool_detected {
            return Err(AuditError::AttestationDenied {
                reason: format!("forensic tools running: {}", self.detected_tools.join(", ")),
            }
            .into());
        }
        if !self.policy_check {
            return Err(AuditError::AttestationDenied {
                reason: format!("device {} is not approved for wiping", self.device_id),
            }
            .into());
        }
        Ok(())
    }
}

/// Runs attestation checks.
pub struct Attestor {
    processes: Box<dyn ProcessSource>,
    settings: AttestationSettings,
}

impl Attestor {
    /// Creates an attestor over a process source.
    #[must_use]
    pub fn new(processes: Box<dyn ProcessSource>, settings: AttestationSettings) -> Self {
        Self { processes, settings }
    }

    /// Checks `operator` and the host before wiping `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::EmptyOperator`] for a blank operator. Failed
    /// checks are reported in the result; call
    /// [`AttestationResult::enforce`] to refuse.
    pub fn attest(&self, device_id: &str, kind: DeviceKind, operator: &str) -> Result<AttestationResult> {
        let operator = operator.trim();
        if operator.is_empty() {
            return Err(AuditError::EmptyOperator.into());
        }

        let detected_tools = self.scan_processes();
        let policy_check = self.policy_allows(device_id, kind);
        let result = AttestationResult {
            operator_id: operator.to_string(),
            forensic_tool_detected: !detected_tools.is_empty(),
            detected_tools,
            policy_check,
            timestamp: Utc::now(),
            device_id: device_id.to_string(),
        };

        if result.forensic_tool_detected {
            tracing::warn!(tools = ?result.detected_tools, "forensic tools detected");
        }
        tracing::info!(
            operator = %result.operator_id,
            device = %device_id,
            policy = result.policy_check,
            forensic = result.forensic_tool_detected,
            "attestation complete"
        );
        Ok(result)
    }

    fn scan_processes(&self) -> Vec<String> {
        let tools: Vec<String> = self.settings.forensic_tools.iter().map(|t| t.to_lowercase()).collect();
        let mut found: Vec<String> = self
            .processes
            .process_names()
            .into_iter()
            .filter(|name| {
                let lower = name.to_lowercase();
                tools.iter().any(|tool| !tool.is_empty() && lower.contains(tool.as_str()))
            })
            .collect();
        found.sort();
        found.dedup();
        found
    }

    fn policy_allows(&self, device_id: &str, kind: DeviceKind) -> bool {
        let approved = self
            .settings
            .approved_media
            .iter()
            .any(|m| DeviceKind::parse(m) == Some(kind));
        let upper = device_id.to_uppercase();
        approved || APPROVED_ID_MARKERS.iter().any(|marker| upper.contains(marker))
    }
}
