//! End-to-end wipe jobs.
//!
//! A run probes the target, resolves the method, attests, unmounts, wipes,
//! verifies and certifies, moving a [`WipeJob`] through its states. Wipe
//! failures end up in the [`WipeReport`] rather than as errors, so a
//! certificate can record them. Precondition failures (bad target, method
//! not applicable, attestation denied) are returned as errors.

use crate::audit::attest::{AttestationResult, Attestor};
use crate::cert::issue::{IssuedCertificate, Issuer};
use crate::cert::record::Certificate;
use crate::config::Settings;
use crate::core::device::{Device, DeviceKind, DeviceMetadata, SystemMetadata};
use crate::core::job::{JobState, WipeJob};
use crate::core::method::{NistCategory, VerifyMode, WipeMethod, default_method};
use crate::error::{DeviceError, Error, Result, WipeError};
use crate::io::TargetFile;
use crate::system::host::collect_system_metadata;
use crate::system::mount::unmount_device;
use crate::system::probe::{collect_device_metadata, probe_device};
use crate::system::runner::CommandRunner;
use crate::verify::{VerificationReport, verify_path};
use crate::wipe::android::ANDROID_DEVICE;
use crate::wipe::create_wiper;
use crate::wipe::log::WipeLog;
use crate::wipe::traits::{CancelToken, WipeContext, WipeOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Status recorded when the operator cancels a run.
pub const STATUS_CANCELLED: &str = "cancelled_by_user";

/// What to wipe and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipeRequest {
    /// Device node, image path, or `android`.
    pub target: String,
    /// Requested method. `None` picks the default for the device kind.
    pub method: Option<WipeMethod>,
    /// Verification depth.
    pub verify: VerifyMode,
    /// Person performing the wipe.
    pub operator: String,
    /// Overrides the probed device kind.
    pub kind: Option<DeviceKind>,
    /// Reboot Android handsets afterwards.
    pub reboot: bool,
}

impl WipeRequest {
    /// Creates a request with default method and sampled verification.
    #[must_use]
    pub fn new(target: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: None,
            verify: VerifyMode::default(),
            operator: operator.into(),
            kind: None,
            reboot: false,
        }
    }

    /// Sets the method.
    #[must_use]
    pub const fn with_method(mut self, method: WipeMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the verification depth.
    #[must_use]
    pub const fn with_verify(mut self, verify: VerifyMode) -> Self {
        self.verify = verify;
        self
    }

    /// Overrides the device kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Resolved plan for a request. Produced without touching the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipePlan {
    /// Probed device.
    pub device: Device,
    /// Method asked for (or the kind default).
    pub requested: WipeMethod,
    /// Method that will run.
    pub effective: WipeMethod,
    /// Wiper strategy name.
    pub wiper: String,
    /// Verification depth that will run.
    pub verify_mode: VerifyMode,
    /// Adjustments made while planning.
    pub notes: Vec<String>,
}

/// Everything known about a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeReport {
    /// Job record with state history.
    pub job: WipeJob,
    /// Media details.
    pub device_metadata: DeviceMetadata,
    /// Host details.
    pub system_metadata: SystemMetadata,
    /// Pre-wipe attestation, if it ran.
    pub attestation: Option<AttestationResult>,
    /// Status code of the wipe step.
    pub status: String,
    /// Whether the wipe step succeeded.
    pub success: bool,
    /// Whether verification ran and passed.
    pub verified_clean: bool,
    /// Method that actually ran.
    pub effective_method: WipeMethod,
    /// Category achieved.
    pub category: NistCategory,
    /// Passes completed.
    pub passes: u32,
    /// Bytes written natively.
    pub bytes_written: u64,
    /// Read-back result.
    pub verification: Option<VerificationReport>,
    /// Per-run log file.
    pub log_path: Option<PathBuf>,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub completed_at: DateTime<Utc>,
    /// Issued certificate, if an issuer was configured.
    pub certificate: Option<IssuedCertificate>,
}

/// Runs wipe jobs.
pub struct WipeEngine {
    settings: Settings,
    runner: Arc<dyn CommandRunner>,
    cancel: CancelToken,
    attestor: Option<Attestor>,
    issuer: Option<Issuer>,
}

impl WipeEngine {
    /// Creates an engine without attestation or certificate issuance.
    #[must_use]
    pub fn new(settings: Settings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            settings,
            runner,
            cancel: CancelToken::new(),
            attestor: None,
            issuer: None,
        }
    }

    /// Runs attestation before each wipe.
    #[must_use]
    pub fn with_attestor(mut self, attestor: Attestor) -> Self {
        self.attestor = Some(attestor);
        self
    }

    /// Issues a signed certificate after each wipe.
    #[must_use]
    pub fn with_issuer(mut self, issuer: Issuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Shares an existing cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels every run of this engine.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Engine settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Probes the target and resolves the method without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotFound`] for a missing target and
    /// [`WipeError::Unsupported`] when the method does not apply.
    pub fn plan(&self, request: &WipeRequest) -> Result<WipePlan> {
        let device = self.probe(request)?;
        let kind = device.kind;
        let requested = request.method.unwrap_or_else(|| default_method(kind));

        if (requested == WipeMethod::Android) != (kind == DeviceKind::Android) {
            return Err(WipeError::Unsupported {
                method: requested.to_string(),
                kind: kind.to_string(),
            }
            .into());
        }

        let mut notes = Vec::new();
        let effective = if requested == WipeMethod::Auto && !matches!(kind, DeviceKind::Ata | DeviceKind::Nvme) {
            notes.push("Auto method not applicable, falling back to Zero Fill.".to_string());
            WipeMethod::Zero
        } else {
            requested
        };

        let wiper = create_wiper(effective, kind, request.reboot)?;
        wiper.validate(&device)?;

        let mut verify_mode = request.verify;
        if verify_mode != VerifyMode::None
            && (matches!(effective, WipeMethod::Quick | WipeMethod::Android)
                || !VerifyMode::options_for(kind).contains(&verify_mode))
        {
            notes.push(format!("Verification disabled for {effective} wipes."));
            verify_mode = VerifyMode::None;
        }

        Ok(WipePlan {
            device,
            requested,
            effective,
            wiper: wiper.name().to_string(),
            verify_mode,
            notes,
        })
    }

    fn probe(&self, request: &WipeRequest) -> Result<Device> {
        if request.target == ANDROID_DEVICE || request.kind == Some(DeviceKind::Android) {
            return Ok(Device::new(ANDROID_DEVICE, DeviceKind::Android));
        }
        if !Path::new(&request.target).exists() {
            return Err(DeviceError::NotFound {
                path: request.target.clone(),
            }
            .into());
        }

        let mut device = probe_device(self.runner.as_ref(), &request.target);
        if let Some(kind) = request.kind {
            device.kind = kind;
        }
        if device.size_bytes == 0
            && let Ok(target) = TargetFile::open_read(&request.target)
        {
            device.size_bytes = target.size();
        }
        Ok(device)
    }

    /// Runs one job to completion.
    ///
    /// # Errors
    ///
    /// Returns an error for precondition failures: missing target,
    /// inapplicable method, denied attestation, or a target that cannot be
    /// opened. Wipe and verification failures are reported in the result.
    pub fn run(&self, request: &WipeRequest) -> Result<WipeReport> {
        let plan = self.plan(request)?;
        let started_at = Utc::now();
        let runner = self.runner.as_ref();
        let device = plan.device.clone();

        let mut job = WipeJob::new(device.clone(), plan.requested, plan.verify_mode);
        job.effective_method = plan.effective;

        let system_metadata = collect_system_metadata(&request.operator);
        let mut device_metadata = if device.kind.is_block() {
            collect_device_metadata(runner, &device)
        } else {
            DeviceMetadata {
                device: ANDROID_DEVICE.to_string(),
                interface: device.kind.to_string(),
                ..DeviceMetadata::default()
            }
        };

        let mut log = self.open_log(&device.path);
        log.line(&format!(
            "Job {}: {} wipe of {} ({}), verify {}",
            job.id, plan.effective, device.path, device.kind, plan.verify_mode
        ));
        for note in &plan.notes {
            log.line(note);
        }
        tracing::info!(job = %job.id, device = %device.path, method = %plan.effective, "starting wipe");

        let attestation = match &self.attestor {
            Some(attestor) => {
                job.transition(JobState::Attesting)?;
                let result = attestor.attest(&device.path, device.kind, &request.operator)?;
                log.line(&format!(
                    "Attestation: forensic tools detected={}, policy={}",
                    result.forensic_tool_detected, result.policy_check
                ));
                if self.settings.attestation.required
                    && let Err(e) = result.enforce()
                {
                    log.line(&format!("Wipe refused: {e}"));
                    job.fail();
                    return Err(e);
                }
                Some(result)
            }
            None => None,
        };

        job.transition(JobState::Unmounting)?;
        if device.kind.is_block() && is_block_device(&device.path) {
            let unmounted = unmount_device(runner, &device.path, &mut log);
            if !unmounted.is_empty() {
                tracing::info!(device = %device.path, count = unmounted.len(), "partitions unmounted");
            }
        }

        job.transition(JobState::Wiping)?;
        let wiper = create_wiper(plan.effective, device.kind, request.reboot)?;
        let wiped = {
            let mut ctx = WipeContext {
                device: &device,
                settings: &self.settings,
                runner,
                cancel: &self.cancel,
                log: &mut log,
            };
            wiper.wipe(&mut ctx)
        };
        let mut cancelled = false;
        let mut outcome = match wiped {
            Ok(outcome) => outcome,
            Err(Error::Wipe(WipeError::Cancelled)) => {
                log.line("Cancelled by user.");
                cancelled = true;
                WipeOutcome::failed(plan.effective, STATUS_CANCELLED)
            }
            Err(e) => {
                log.line(&format!("Wipe aborted: {e}"));
                job.fail();
                return Err(e);
            }
        };

        job.effective_method = outcome.effective_method;
        if let Some(meta) = outcome.metadata.clone() {
            device_metadata = meta;
        }

        let mut verification = None;
        if !cancelled
            && outcome.success
            && outcome.verifiable
            && plan.verify_mode != VerifyMode::None
            && let Some(pattern) = outcome.final_pattern
        {
            job.transition(JobState::Verifying)?;
            log.line(&format!("Verifying ({})...", plan.verify_mode));
            match verify_path(&device.path, plan.verify_mode, &pattern, &self.settings.wipe, &self.cancel) {
                Ok(report) => {
                    log.line(&format!(
                        "Verification {}: {} sample(s), {} bytes, digest {}",
                        if report.passed { "passed" } else { "FAILED" },
                        report.samples,
                        report.bytes_checked,
                        report.digest
                    ));
                    verification = Some(report);
                }
                Err(Error::Wipe(WipeError::Cancelled)) => {
                    log.line("Verification cancelled by user.");
                    cancelled = true;
                    outcome.status = STATUS_CANCELLED.to_string();
                    outcome.success = false;
                }
                Err(e) => {
                    tracing::warn!(device = %device.path, error = %e, "verification failed to run");
                    log.line(&format!("Verification error: {e}"));
                }
            }
        }

        job.status = Some(outcome.status.clone());
        log.line(&format!("Wipe status: {}", outcome.status));

        job.transition(JobState::Certifying)?;
        let mut report = Self::assemble(
            job,
            device_metadata,
            system_metadata,
            attestation,
            &outcome,
            verification,
            &log,
            started_at,
        );

        if let Some(issuer) = &self.issuer {
            let cert = Certificate::from_report(&report, &self.settings.certificate);
            match issuer.issue(&cert) {
                Ok(issued) => {
                    log.line(&format!("Certificate written: {}", issued.json_path.display()));
                    report.certificate = Some(issued);
                }
                Err(e) => {
                    tracing::error!(device = %device.path, error = %e, "certificate issuance failed");
                    log.line(&format!("Certificate error: {e}"));
                }
            }
        }

        if cancelled {
            report.job.transition(JobState::Cancelled)?;
        } else if report.success {
            report.job.transition(JobState::Completed)?;
        } else {
            report.job.fail();
        }
        tracing::info!(
            job = %report.job.id,
            status = %report.status,
            verified = report.verified_clean,
            "wipe finished"
        );
        Ok(report)
    }

    fn open_log(&self, device: &str) -> WipeLog {
        WipeLog::create(&self.settings.paths.log_dir, device).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not open wipe log");
            WipeLog::discard()
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        job: WipeJob,
        device_metadata: DeviceMetadata,
        system_metadata: SystemMetadata,
        attestation: Option<AttestationResult>,
        outcome: &WipeOutcome,
        verification: Option<VerificationReport>,
        log: &WipeLog,
        started_at: DateTime<Utc>,
    ) -> WipeReport {
        WipeReport {
            job,
            device_metadata,
            system_metadata,
            attestation,
            status: outcome.status.clone(),
            success: outcome.success,
            verified_clean: verification.as_ref().is_some_and(|v| v.passed),
            effective_method: outcome.effective_method,
            category: outcome.category,
            passes: outcome.passes,
            bytes_written: outcome.bytes_written,
            verification,
            log_path: log.path().map(Path::to_path_buf),
            started_at,
            completed_at: Utc::now(),
            certificate: None,
        }
    }
}

fn is_block_device(path: &str) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.file_type().is_block_device())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::host::StaticProcesses;
    use crate::system::testing::ScriptedRunner;
    use ed25519_dalek::SigningKey;
    use std::os::unix::fs::FileExt;
    use tempfile::{NamedTempFile, TempDir};

    const HDPARM_FROZEN: &str = "\
ATA device, with non-removable media
Security:
\tMaster password revision code = 65534
\t\tsupported
\tnot\tenabled
\tnot\tlocked
\t\tfrozen
Checksum: correct
";

    const HDPARM_UNSUPPORTED: &str = "\
ATA device, with non-removable media
Security:
\tnot\tsupported
\tnot\tfrozen
Checksum: correct
";

    struct Fixture {
        logs: TempDir,
        settings: Settings,
    }

    fn fixture() -> Fixture {
        let logs = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.paths.log_dir = logs.path().to_path_buf();
        settings.wipe.block_size = 4096;
        settings.wipe.sample_len = 512;
        settings.wipe.shred_passes = 1;
        settings.wipe.fallback_passes = 2;
        settings.android.fastboot_wait_secs = 2;
        Fixture { logs, settings }
    }

    fn image(len: usize, fill: u8) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![fill; len]).unwrap();
        file
    }

    fn engine(fx: &Fixture, runner: &Arc<ScriptedRunner>) -> WipeEngine {
        WipeEngine::new(fx.settings.clone(), runner.clone())
    }

    fn path_of(file: &NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_zero_fill_image() {
        let fx = fixture();
        let img = image(20_000, 0x77);
        let runner = Arc::new(ScriptedRunner::new());

        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Zero);
        let report = engine(&fx, &runner).run(&request).unwrap();

        assert!(report.success);
        assert_eq!(report.status, "zero_fill_ok");
        assert!(report.verified_clean);
        assert_eq!(report.bytes_written, 20_000);
        assert_eq!(report.job.state, JobState::Completed);
        assert!(!report.job.history.contains(&JobState::Attesting));
        assert!(report.job.history.contains(&JobState::Verifying));
        assert!(report.log_path.unwrap().exists());
        assert_eq!(report.system_metadata.operator, "alice");
        assert!(std::fs::read(img.path()).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_auto_on_unknown_falls_back_to_zero() {
        let fx = fixture();
        let img = image(8_192, 0x11);
        let runner = Arc::new(ScriptedRunner::new());
        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Auto);

        let plan = engine(&fx, &runner).plan(&request).unwrap();
        assert_eq!(plan.effective, WipeMethod::Zero);
        assert!(plan.notes[0].contains("falling back to Zero Fill"));

        let report = engine(&fx, &runner).run(&request).unwrap();
        assert_eq!(report.job.requested_method, WipeMethod::Auto);
        assert_eq!(report.effective_method, WipeMethod::Zero);
        assert_eq!(report.category, NistCategory::Clear);
    }

    #[test]
    fn test_plan_does_not_touch_target() {
        let fx = fixture();
        let img = image(4_096, 0x42);
        let runner = Arc::new(ScriptedRunner::new());
        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Shred);

        let plan = engine(&fx, &runner).plan(&request).unwrap();
        assert_eq!(plan.wiper, "shred");
        assert_eq!(plan.device.size_bytes, 4_096);
        assert!(std::fs::read(img.path()).unwrap().iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_ata_frozen() {
        let fx = fixture();
        let img = image(4_096, 0x42);
        let runner = Arc::new(ScriptedRunner::new().on_ok("hdparm -I", HDPARM_FROZEN));
        let request = WipeRequest::new(path_of(&img), "alice").with_kind(DeviceKind::Ata);

        let report = engine(&fx, &runner).run(&request).unwrap();
        assert!(!report.success);
        assert_eq!(report.status, "frozen");
        assert_eq!(report.job.state, JobState::Failed);
        assert!(report.verification.is_none());
        assert!(!runner.called("hdparm --user-master"));
    }

    #[test]
    fn test_ata_unsupported_falls_back_to_random() {
        let fx = fixture();
        let img = image(10_000, 0x42);
        let runner = Arc::new(ScriptedRunner::new().on_ok("hdparm -I", HDPARM_UNSUPPORTED));
        let request = WipeRequest::new(path_of(&img), "alice").with_kind(DeviceKind::Ata);

        let report = engine(&fx, &runner).run(&request).unwrap();
        assert!(report.success);
        assert_eq!(report.status, "random_overwrite_ok");
        assert_eq!(report.effective_method, WipeMethod::Random);
        assert_eq!(report.category, NistCategory::Clear);
        assert_eq!(report.passes, 2);
        assert!(report.verified_clean);
    }

    #[test]
    fn test_nvme_sanitize_flow() {
        let fx = fixture();
        let img = image(8_192, 0);
        let runner = Arc::new(
            ScriptedRunner::new()
                .on_ok("nvme sanitize-log", r#"{"sstat":2}"#)
                .on_ok("nvme sanitize-log", r#"{"sstat":257}"#),
        );
        let request = WipeRequest::new(path_of(&img), "alice").with_kind(DeviceKind::Nvme);

        let report = engine(&fx, &runner).run(&request).unwrap();
        assert!(report.success);
        assert_eq!(report.status, "nvme_sanitize_format_ok");
        assert_eq!(report.category, NistCategory::Purge);
        assert!(report.verified_clean);
        assert!(runner.called(&format!("nvme sanitize {} --sanact=2", path_of(&img))));
        assert!(runner.called(&format!("nvme format {} --ses=1", path_of(&img))));
    }

    #[test]
    fn test_usb_quick_wipe_sequence() {
        const MIB: u64 = 1024 * 1024;
        let fx = fixture();
        let img = NamedTempFile::new().unwrap();
        img.as_file().set_len(12 * MIB).unwrap();
        img.as_file().write_at(&[0xAB; 16], 0).unwrap();
        img.as_file().write_at(&[0xCD; 16], 12 * MIB - 16).unwrap();
        img.as_file().write_at(&[0xEF; 16], 10 * MIB + 4).unwrap();

        let dev = path_of(&img);
        let tree = format!(
            r#"{{"blockdevices":[{{"name":"img","path":"{dev}","type":"disk","children":[{{"name":"img1","path":"{dev}1","type":"part","mountpoint":null}}]}}]}}"#
        );
        let runner = Arc::new(ScriptedRunner::new().on_ok("lsblk -J -o NAME,PATH,TYPE,MOUNTPOINT", &tree));
        let request = WipeRequest::new(dev.clone(), "alice").with_kind(DeviceKind::Usb);

        let report = engine(&fx, &runner).run(&request).unwrap();
        assert!(report.success);
        assert_eq!(report.status, format!("usb_quick_wipe_ok:{dev}1"));
        assert_eq!(report.effective_method, WipeMethod::Quick);
        assert_eq!(report.job.verify_mode, VerifyMode::None);
        assert!(report.verification.is_none());

        let sequence: Vec<String> = runner
            .calls()
            .into_iter()
            .filter(|c| !c.starts_with("lsblk") && !c.starts_with("smartctl") && !c.starts_with("blockdev"))
            .collect();
        assert_eq!(
            sequence,
            vec![
                format!("wipefs -a {dev}"),
                format!("parted -s {dev} mklabel msdos"),
                format!("parted -s {dev} mkpart primary fat32 0% 100%"),
                format!("partprobe {dev}"),
                format!("mkfs.vfat -F 32 -n USBDRIVE {dev}1"),
            ]
        );

        let data = std::fs::read(img.path()).unwrap();
        assert!(data[..16].iter().all(|&b| b == 0));
        assert!(data[data.len() - 16..].iter().all(|&b| b == 0));
        assert_eq!(data[usize::try_from(10 * MIB).unwrap() + 4], 0xEF);
    }

    #[test]
    fn test_usb_partition_never_appears() {
        let fx = fixture();
        let img = image(4_096, 1);
        let runner = Arc::new(ScriptedRunner::new().on_ok(
            "lsblk -J -o NAME,PATH,TYPE,MOUNTPOINT",
            r#"{"blockdevices":[{"name":"img","type":"disk"}]}"#,
        ));
        let request = WipeRequest::new(path_of(&img), "alice").with_kind(DeviceKind::Usb);

        let report = engine(&fx, &runner).run(&request).unwrap();
        assert!(!report.success);
        assert_eq!(report.status, "partition_not_found");
        assert!(!runner.called("mkfs.vfat"));
    }

    #[test]
    fn test_android_locked_bootloader() {
        let fx = fixture();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on_ok("adb get-serialno", "R58M123ABC\n")
                .on_ok("adb shell getprop ro.product.manufacturer", "samsung\n")
                .on_ok("adb shell getprop ro.product.model", "SM-G973F\n")
                .on_ok("adb shell getprop ro.boot.verifiedbootstate", "green\n"),
        );
        let request = WipeRequest::new(ANDROID_DEVICE, "alice");

        let report = engine(&fx, &runner).run(&request).unwrap();
        assert!(!report.success);
        assert_eq!(report.status, "bootloader_locked");
        assert_eq!(report.device_metadata.vendor, "samsung");
        assert_eq!(report.device_metadata.serial, "R58M123ABC");
        assert_eq!(report.job.state, JobState::Failed);
    }

    #[test]
    fn test_android_method_rejected_on_block_target() {
        let fx = fixture();
        let img = image(1_024, 0);
        let runner = Arc::new(ScriptedRunner::new());
        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Android);

        let err = engine(&fx, &runner).run(&request).unwrap_err();
        assert!(matches!(err, Error::Wipe(WipeError::Unsupported { .. })));
    }

    #[test]
    fn test_quick_rejected_on_unknown() {
        let fx = fixture();
        let img = image(1_024, 0);
        let runner = Arc::new(ScriptedRunner::new());
        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Quick);
        assert!(engine(&fx, &runner).plan(&request).is_err());
    }

    #[test]
    fn test_missing_target() {
        let fx = fixture();
        let runner = Arc::new(ScriptedRunner::new());
        let request = WipeRequest::new("/nonexistent/nullwipe-target", "alice");
        let err = engine(&fx, &runner).run(&request).unwrap_err();
        assert!(matches!(err, Error::Device(DeviceError::NotFound { .. })));
    }

    fn issuer(fx: &Fixture) -> Issuer {
        let mut settings = fx.settings.clone();
        settings.paths.cert_dir = fx.logs.path().join("certs");
        Issuer::new(SigningKey::from_bytes(&[7u8; 32]), settings)
    }

    fn certificate_json(report: &WipeReport) -> serde_json::Value {
        let issued = report.certificate.as_ref().unwrap();
        serde_json::from_str(&std::fs::read_to_string(&issued.json_path).unwrap()).unwrap()
    }

    #[test]
    fn test_cancelled_before_first_block() {
        let fx = fixture();
        let img = image(16_384, 0x33);
        let runner = Arc::new(ScriptedRunner::new());
        let engine = engine(&fx, &runner).with_issuer(issuer(&fx));
        engine.cancel_token().cancel();

        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Zero);
        let report = engine.run(&request).unwrap();
        assert!(!report.success);
        assert_eq!(report.status, STATUS_CANCELLED);
        assert_eq!(report.job.state, JobState::Cancelled);
        assert_eq!(report.job.status.as_deref(), Some(STATUS_CANCELLED));
        assert!(report.job.history.contains(&JobState::Certifying));
        assert!(!report.job.history.contains(&JobState::Verifying));
        assert!(std::fs::read(img.path()).unwrap().iter().all(|&b| b == 0x33));

        let cert = certificate_json(&report);
        assert_eq!(cert["Execution"]["Status"], STATUS_CANCELLED);
    }

    #[test]
    fn test_certificate_matches_report_times() {
        let fx = fixture();
        let img = image(8_192, 0x5a);
        let runner = Arc::new(ScriptedRunner::new());
        let engine = engine(&fx, &runner).with_issuer(issuer(&fx));

        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Zero);
        let report = engine.run(&request).unwrap();
        assert_eq!(report.job.state, JobState::Completed);

        let cert = certificate_json(&report);
        assert_eq!(cert["Execution"]["CompletedAt"], report.completed_at.to_rfc3339());
        assert_eq!(cert["Execution"]["StartedAt"], report.started_at.to_rfc3339());
    }

    #[test]
    fn test_attestation_denied() {
        let mut fx = fixture();
        fx.settings.attestation.approved_media = vec!["unknown".to_string()];
        let img = image(1_024, 0x33);
        let runner = Arc::new(ScriptedRunner::new());
        let attestor = Attestor::new(
            Box::new(StaticProcesses::of(&["bash", "gdb"])),
            fx.settings.attestation.clone(),
        );
        let engine = engine(&fx, &runner).with_attestor(attestor);

        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Zero);
        let err = engine.run(&request).unwrap_err();
        assert!(matches!(err, Error::Audit(crate::error::AuditError::AttestationDenied { .. })));
        assert!(std::fs::read(img.path()).unwrap().iter().all(|&b| b == 0x33));
    }

    #[test]
    fn test_attestation_recorded() {
        let mut fx = fixture();
        fx.settings.attestation.approved_media = vec!["unknown".to_string()];
        let img = image(1_024, 0x33);
        let runner = Arc::new(ScriptedRunner::new());
        let attestor = Attestor::new(
            Box::new(StaticProcesses::of(&["bash"])),
            fx.settings.attestation.clone(),
        );
        let engine = engine(&fx, &runner).with_attestor(attestor);

        let request = WipeRequest::new(path_of(&img), "alice").with_method(WipeMethod::Zero);
        let report = engine.run(&request).unwrap();
        assert!(report.job.history.contains(&JobState::Attesting));
        let attestation = report.attestation.unwrap();
        assert!(attestation.policy_check);
        assert!(!attestation.forensic_tool_detected);
    }
}
