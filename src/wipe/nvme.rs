//! NVMe Sanitize followed by a user-data-erase format (NIST Purge).

use crate::core::method::WipeMethod;
use crate::error::Result;
use crate::system::runner::require_tools;
use crate::wipe::traits::{WipeContext, WipeOutcome, Wiper};
use serde_json::Value;
use std::time::Duration;

/// Consecutive unreadable sanitize-log polls before giving up on the log.
const MAX_LOG_FAILURES: u32 = 3;

/// Sanitize status from the `SSTAT` field of the sanitize log page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeStatus {
    /// Never sanitized.
    Idle,
    /// Most recent sanitize completed.
    Completed,
    /// Sanitize running.
    InProgress,
    /// Most recent sanitize failed.
    Failed,
}

impl SanitizeStatus {
    /// Decodes the low three bits of `SSTAT`.
    #[must_use]
    pub const fn from_sstat(sstat: u64) -> Self {
        match sstat & 0x7 {
            1 | 4 => Self::Completed,
            2 => Self::InProgress,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

/// How polling the sanitize log ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SanitizeWait {
    /// A terminal status was read.
    Settled(SanitizeStatus),
    /// The log could not be read, so completion is unknown.
    Unconfirmed,
    /// Still running after the last poll.
    TimedOut,
}

/// Finds `sstat` anywhere in `nvme sanitize-log -o json` output.
///
/// nvme-cli nests the log under the device name in some releases.
#[must_use]
pub fn parse_sanitize_log(json: &str) -> Option<SanitizeStatus> {
    let root: Value = serde_json::from_str(json).ok()?;
    find_key(&root, "sstat")
        .and_then(Value::as_u64)
        .map(SanitizeStatus::from_sstat)
}

fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// NVMe sanitize wiper.
#[derive(Debug, Clone, Copy, Default)]
pub struct NvmeSanitizeWiper;

impl NvmeSanitizeWiper {
    /// Polls the sanitize log until the operation settles.
    fn wait_for_sanitize(ctx: &mut WipeContext<'_>, device: &str) -> Result<SanitizeWait> {
        let poll = Duration::from_secs(ctx.settings.wipe.sanitize_poll_secs);
        let mut failures = 0;
        for attempt in 0..ctx.settings.wipe.sanitize_max_polls {
            ctx.cancel.check()?;
            let status = ctx
                .runner
                .run("nvme", &["sanitize-log", device, "-o", "json"], ctx.command_timeout())
                .ok()
                .filter(crate::system::runner::CommandOutput::success)
                .and_then(|out| parse_sanitize_log(&out.stdout));

            match status {
                Some(s @ (SanitizeStatus::Completed | SanitizeStatus::Failed)) => {
                    return Ok(SanitizeWait::Settled(s));
                }
                Some(_) => failures = 0,
                None => {
                    failures += 1;
                    if failures >= MAX_LOG_FAILURES {
                        return Ok(SanitizeWait::Unconfirmed);
                    }
                }
            }
            if attempt % 12 == 0 {
                ctx.log.line("Sanitize in progress...");
            }
            ctx.runner.sleep(poll);
        }
        Ok(SanitizeWait::TimedOut)
    }
}

impl Wiper for NvmeSanitizeWiper {
    fn wipe(&self, ctx: &mut WipeContext<'_>) -> Result<WipeOutcome> {
        let device = ctx.device.path.clone();
        ctx.log.line(&format!("Starting NVMe sanitize on {device}"));

        if let Err(e) = require_tools(ctx.runner, &["nvme"]) {
            ctx.log.line(&format!("{e}"));
            return Ok(WipeOutcome::failed(WipeMethod::Auto, "nvme_missing"));
        }

        let sanact = format!("--sanact={}", ctx.settings.wipe.nvme_sanitize_action);
        ctx.log.line(&format!("Running sanitize ({})...", &sanact[2..]));
        match ctx.runner.run("nvme", &["sanitize", &device, &sanact], ctx.command_timeout()) {
            Ok(out) => {
                ctx.log.raw(&out.combined());
                if !out.success() {
                    ctx.log.line("Sanitize command failed.");
                    return Ok(WipeOutcome::failed(WipeMethod::Auto, "nvme_sanitize_failed"));
                }
            }
            Err(e) => {
                ctx.log.line(&format!("nvme sanitize error: {e}"));
                return Ok(WipeOutcome::failed(WipeMethod::Auto, "nvme_exception"));
            }
        }

        match Self::wait_for_sanitize(ctx, &device)? {
            SanitizeWait::Settled(SanitizeStatus::Completed) => ctx.log.line("Sanitize completed."),
            SanitizeWait::Settled(_) => {
                ctx.log.line("Sanitize reported failure.");
                return Ok(WipeOutcome::failed(WipeMethod::Auto, "nvme_sanitize_failed"));
            }
            SanitizeWait::Unconfirmed => {
                ctx.log.line("Sanitize log unavailable; completion could not be confirmed.");
                tracing::warn!(device = %device, "sanitize status unreadable");
                return Ok(WipeOutcome::failed(WipeMethod::Auto, "nvme_sanitize_unconfirmed"));
            }
            SanitizeWait::TimedOut => {
                ctx.log.line("Sanitize did not finish in time.");
                return Ok(WipeOutcome::failed(WipeMethod::Auto, "nvme_sanitize_timeout"));
            }
        }

        ctx.cancel.check()?;
        ctx.log.line("Running format (ses=1)...");
        match ctx.runner.run("nvme", &["format", &device, "--ses=1"], ctx.erase_timeout()) {
            Ok(out) => {
                ctx.log.raw(&out.combined());
                if !out.success() {
                    ctx.log.line("Format command failed.");
                    return Ok(WipeOutcome::failed(WipeMethod::Auto, "nvme_format_failed"));
                }
            }
            Err(e) => {
                ctx.log.line(&format!("nvme format error: {e}"));
                return Ok(WipeOutcome::failed(WipeMethod::Auto, "nvme_format_failed"));
            }
        }

        ctx.log.line("NVMe sanitize+format completed successfully.");
        tracing::info!(device = %device, "NVMe sanitize complete");
        Ok(WipeOutcome::purged(WipeMethod::Auto, "nvme_sanitize_format_ok"))
    }

    fn method(&self) -> WipeMethod {
        WipeMethod::Auto
    }

    fn name(&self) -> &'static str {
        "nvme-sanitize"
    }
}
