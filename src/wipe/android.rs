//! Android handset erase through adb and fastboot.
//!
//! The handset is rebooted into its bootloader and the userdata and cache
//! partitions are erased. A locked bootloader (verified boot state `green`)
//! refuses erase commands, so the run stops there and is recorded as such.

use crate::core::device::DeviceMetadata;
use crate::core::method::{NistCategory, WipeMethod};
use crate::error::Result;
use crate::system::runner::require_tools;
use crate::wipe::traits::{WipeContext, WipeOutcome, Wiper};
use std::time::Duration;

/// Identifier used as the device path for handsets.
pub const ANDROID_DEVICE: &str = "android";

/// Properties read over adb.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AndroidInfo {
    /// `adb get-serialno`.
    pub serial: String,
    /// `ro.product.model`.
    pub model: String,
    /// `ro.product.manufacturer`.
    pub manufacturer: String,
    /// `ro.build.version.release`.
    pub android_version: String,
    /// `ro.boot.verifiedbootstate`.
    pub bootloader_state: String,
    /// `ro.product.name`.
    pub device_name: String,
}

impl AndroidInfo {
    /// Whether the verified boot state shows a locked bootloader.
    #[must_use]
    pub fn bootloader_locked(&self) -> bool {
        self.bootloader_state.trim() == "green"
    }

    /// Certificate metadata for the handset.
    #[must_use]
    pub fn to_metadata(&self) -> DeviceMetadata {
        DeviceMetadata {
            device: ANDROID_DEVICE.to_string(),
            vendor: self.manufacturer.clone(),
            model: self.model.clone(),
            serial: self.serial.clone(),
            firmware: format!("Android {}", self.android_version),
            capacity_bytes: 0,
            capacity_human: String::new(),
            interface: "ANDROID".to_string(),
        }
    }
}

/// Parses the first device id from `fastboot devices` output.
#[must_use]
pub fn parse_fastboot_devices(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .next()
        .map(ToString::to_string)
}

/// Android erase wiper.
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidWiper {
    /// Reboot the handset after erasing.
    pub reboot: bool,
}

impl AndroidWiper {
    fn adb(ctx: &WipeContext<'_>, args: &[&str]) -> String {
        ctx.runner
            .run("adb", args, ctx.command_timeout())
            .ok()
            .filter(crate::system::runner::CommandOutput::success)
            .map(|out| out.stdout.trim().to_string())
            .unwrap_or_default()
    }

    fn getprop(ctx: &WipeContext<'_>, prop: &str) -> String {
        let value = Self::adb(ctx, &["shell", "getprop", prop]);
        if value.is_empty() { "unknown".to_string() } else { value }
    }

    /// Reads handset properties over adb.
    fn collect_info(ctx: &WipeContext<'_>, serial: &str) -> AndroidInfo {
        AndroidInfo {
            serial: serial.to_string(),
            model: Self::getprop(ctx, "ro.product.model"),
            manufacturer: Self::getprop(ctx, "ro.product.manufacturer"),
            android_version: Self::getprop(ctx, "ro.build.version.release"),
            bootloader_state: Self::getprop(ctx, "ro.boot.verifiedbootstate"),
            device_name: Self::getprop(ctx, "ro.product.name"),
        }
    }

    fn wait_for_fastboot(ctx: &mut WipeContext<'_>) -> Result<Option<String>> {
        for _ in 0..ctx.settings.android.fastboot_wait_secs.max(1) {
            ctx.cancel.check()?;
            if let Ok(out) = ctx.runner.run("fastboot", &["devices"], ctx.command_timeout())
                && let Some(id) = parse_fastboot_devices(&out.stdout)
            {
                return Ok(Some(id));
            }
            ctx.runner.sleep(Duration::from_secs(1));
        }
        Ok(None)
    }

    fn fastboot(ctx: &mut WipeContext<'_>, id: &str, args: &[&str]) -> bool {
        let mut full = vec!["-s", id];
        full.extend_from_slice(args);
        match ctx.runner.run("fastboot", &full, ctx.erase_timeout()) {
            Ok(out) => {
                ctx.log.raw(&out.combined());
                out.success()
            }
            Err(e) => {
                ctx.log.line(&format!("fastboot {} failed: {e}", args.join(" ")));
                false
            }
        }
    }
}

impl Wiper for AndroidWiper {
    fn wipe(&self, ctx: &mut WipeContext<'_>) -> Result<WipeOutcome> {
        ctx.log.line("Starting Android wipe");
        if let Err(e) = require_tools(ctx.runner, &["adb", "fastboot"]) {
            ctx.log.line(&format!("{e}"));
            return Ok(WipeOutcome::failed(WipeMethod::Android, "android_tools_missing"));
        }

        Self::adb(ctx, &["start-server"]);
        ctx.runner.sleep(Duration::from_secs(1));

        let serial = Self::adb(ctx, &["get-serialno"]);
        if serial.is_empty() || serial == "unknown" {
            ctx.log.line("No device. Connect the handset with USB debugging enabled and authorize it.");
            return Ok(WipeOutcome::failed(WipeMethod::Android, "no_device"));
        }

        let info = Self::collect_info(ctx, &serial);
        ctx.log.line(&format!(
            "{} {} (Android {}), verified boot state: {}",
            info.manufacturer, info.model, info.android_version, info.bootloader_state
        ));

        if info.bootloader_locked() {
            ctx.log.line("Bootloader LOCKED. Cannot wipe securely.");
            tracing::warn!(serial = %serial, "bootloader locked");
            let mut outcome = WipeOutcome::failed(WipeMethod::Android, "bootloader_locked");
            outcome.metadata = Some(info.to_metadata());
            return Ok(outcome);
        }

        ctx.log.line("Rebooting to bootloader...");
        Self::adb(ctx, &["reboot", "bootloader"]);

        let Some(id) = Self::wait_for_fastboot(ctx)? else {
            ctx.log.line("Device did not enter fastboot mode in time.");
            let mut outcome = WipeOutcome::failed(WipeMethod::Android, "fastboot_timeout");
            outcome.metadata = Some(info.to_metadata());
            return Ok(outcome);
        };
        ctx.log.line(&format!("Fastboot device: {id}"));

        ctx.cancel.check()?;
        if !Self::fastboot(ctx, &id, &["erase", "userdata"]) {
            let mut outcome = WipeOutcome::failed(WipeMethod::Android, "android_wipe_failed");
            outcome.metadata = Some(info.to_metadata());
            return Ok(outcome);
        }
        // A/B devices have no cache partition.
        if !Self::fastboot(ctx, &id, &["erase", "cache"]) {
            ctx.log.line("Cache erase failed or not present; continuing.");
        }
        if self.reboot {
            Self::fastboot(ctx, &id, &["reboot"]);
        }

        ctx.log.line("Android wipe done.");
        Ok(WipeOutcome {
            success: true,
            status: "android_wipe_done".to_string(),
            effective_method: WipeMethod::Android,
            category: NistCategory::Clear,
            passes: 1,
            bytes_written: 0,
            final_pattern: None,
            verifiable: false,
            metadata: Some(info.to_metadata()),
        })
    }

    fn method(&self) -> WipeMethod {
        WipeMethod::Android
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::device::{Device, DeviceKind};
    use crate::system::testing::ScriptedRunner;
    use crate::wipe::log::WipeLog;
    use crate::wipe::traits::CancelToken;

    fn run(runner: &ScriptedRunner, reboot: bool) -> WipeOutcome {
        let mut settings = Settings::default();
        settings.android.fastboot_wait_secs = 3;
        let device = Device::new(ANDROID_DEVICE, DeviceKind::Android);
        let cancel = CancelToken::new();
        let mut log = WipeLog::discard();
        let mut ctx = WipeContext {
            device: &device,
            settings: &settings,
            runner,
            cancel: &cancel,
            log: &mut log,
        };
        AndroidWiper { reboot }.wipe(&mut ctx).unwrap()
    }

    fn handset() -> ScriptedRunner {
        ScriptedRunner::new()
            .on_ok("adb get-serialno", "R58M123ABC\n")
            .on_ok("adb shell getprop ro.product.model", "SM-G973F\n")
            .on_ok("adb shell getprop ro.product.manufacturer", "samsung\n")
            .on_ok("adb shell getprop ro.build.version.release", "12\n")
            .on_ok("adb shell getprop ro.product.name", "beyond1lte\n")
    }

    #[test]
    fn test_parse_fastboot_devices() {
        assert_eq!(parse_fastboot_devices("R58M123ABC\tfastboot\n").as_deref(), Some("R58M123ABC"));
        assert_eq!(parse_fastboot_devices("\n"), None);
    }

    #[test]
    fn test_locked_bootloader() {
        let runner = handset().on_ok("adb shell getprop ro.boot.verifiedbootstate", "green\n");
        let outcome = run(&runner, false);
        assert!(!outcome.success);
        assert_eq!(outcome.status, "bootloader_locked");
        let meta = outcome.metadata.unwrap();
        assert_eq!(meta.vendor, "samsung");
        assert_eq!(meta.firmware, "Android 12");
        assert!(!runner.called("adb reboot"));
    }

    #[test]
    fn test_unlocked_erase() {
        let runner = handset()
            .on_ok("adb shell getprop ro.boot.verifiedbootstate", "orange\n")
            .on_ok("fastboot devices", "")
            .on_ok("fastboot devices", "R58M123ABC\tfastboot\n");
        let outcome = run(&runner, true);
        assert!(outcome.success);
        assert_eq!(outcome.status, "android_wipe_done");
        assert!(runner.called("fastboot -s R58M123ABC erase userdata"));
        assert!(runner.called("fastboot -s R58M123ABC erase cache"));
        assert!(runner.called("fastboot -s R58M123ABC reboot"));
    }

    #[test]
    fn test_fastboot_timeout() {
        let runner = handset()
            .on_ok("adb shell getprop ro.boot.verifiedbootstate", "orange\n")
            .on_ok("fastboot devices", "");
        let outcome = run(&runner, false);
        assert_eq!(outcome.status, "fastboot_timeout");
    }

    #[test]
    fn test_no_device() {
        let runner = ScriptedRunner::new().on_ok("adb get-serialno", "unknown\n");
        assert_eq!(run(&runner, false).status, "no_device");
    }

    #[test]
    fn test_missing_tools() {
        let runner = ScriptedRunner::new().without_tool("fastboot");
        assert_eq!(run(&runner, false).status, "android_tools_missing");
    }
}
