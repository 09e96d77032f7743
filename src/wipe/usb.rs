//! USB quick wipe: remove signatures, zero the key areas, repartition and
//! format FAT32 so the stick is immediately reusable.

use crate::core::method::{NistCategory, WipeMethod};
use crate::error::{Error, Result, WipeError};
use crate::io::TargetFile;
use crate::system::mount::find_partition;
use crate::system::runner::{command_line, require_tools};
use crate::wipe::overwrite::zero_range;
use crate::wipe::traits::{WipeContext, WipeOutcome, Wiper};
use std::time::Duration;

const HEAD_BYTES: u64 = 10 * 1024 * 1024;
const TAIL_BYTES: u64 = 1024 * 1024;
const VOLUME_LABEL: &str = "USBDRIVE";
const TOOLS: [&str; 4] = ["wipefs", "parted", "partprobe", "mkfs.vfat"];

const STATUS_FAILED: &str = "usb_quick_wipe_failed";
const STATUS_TIMEOUT: &str = "usb_quick_wipe_timeout";

/// USB quick wipe.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsbQuickWiper;

impl UsbQuickWiper {
    /// Runs one external step. On failure returns the status code to report.
    fn step(ctx: &mut WipeContext<'_>, program: &str, args: &[&str]) -> std::result::Result<(), &'static str> {
        let line = command_line(program, args);
        match ctx.runner.run(program, args, ctx.command_timeout()) {
            Ok(out) => {
                ctx.log.raw(&out.combined());
                if out.success() {
                    Ok(())
                } else {
                    ctx.log.line(&format!("Quick wipe failed: command {line} returned {}", out.code));
                    Err(STATUS_FAILED)
                }
            }
            Err(Error::Wipe(WipeError::Timeout { .. })) => {
                ctx.log.line(&format!("Quick wipe failed: timeout in step {line}"));
                Err(STATUS_TIMEOUT)
            }
            Err(e) => {
                ctx.log.line(&format!("Quick wipe failed: {e}"));
                Err(STATUS_FAILED)
            }
        }
    }

    fn zero_key_areas(ctx: &mut WipeContext<'_>) -> Result<u64> {
        let target = TargetFile::open(&ctx.device.path)?;
        let block = ctx.settings.wipe.block_size;
        ctx.log.line("Zeroing first 10MB...");
        let mut written = zero_range(&target, 0, HEAD_BYTES, block)?;
        if target.size() > HEAD_BYTES + TAIL_BYTES {
            ctx.log.line("Zeroing last MB...");
            written += zero_range(&target, target.size() - TAIL_BYTES, TAIL_BYTES, block)?;
        }
        Ok(written)
    }

    fn run(ctx: &mut WipeContext<'_>) -> Result<std::result::Result<(String, u64), &'static str>> {
        let device = ctx.device.path.clone();

        if let Err(status) = Self::step(ctx, "wipefs", &["-a", &device]) {
            return Ok(Err(status));
        }
        ctx.cancel.check()?;

        let zeroed = match Self::zero_key_areas(ctx) {
            Ok(n) => n,
            Err(e @ Error::Device(_)) => return Err(e),
            Err(e) => {
                ctx.log.line(&format!("Quick wipe failed: {e}"));
                return Ok(Err(STATUS_FAILED));
            }
        };
        ctx.cancel.check()?;

        ctx.log.line("Creating new partition table...");
        for args in [
            vec!["-s", device.as_str(), "mklabel", "msdos"],
            vec!["-s", device.as_str(), "mkpart", "primary", "fat32", "0%", "100%"],
        ] {
            if let Err(status) = Self::step(ctx, "parted", &args) {
                return Ok(Err(status));
            }
        }
        if let Err(status) = Self::step(ctx, "partprobe", &[&device]) {
            return Ok(Err(status));
        }
        ctx.log.line("Partition table updated. Waiting for partition to appear...");

        let Some(part) = find_partition(
            ctx.runner,
            &device,
            ctx.settings.wipe.partition_retries,
            Duration::from_secs(1),
        ) else {
            ctx.log.line("Partition not found after creating table.");
            return Ok(Err("partition_not_found"));
        };

        ctx.log.line(&format!("Formatting {part} as FAT32..."));
        if let Err(status) = Self::step(ctx, "mkfs.vfat", &["-F", "32", "-n", VOLUME_LABEL, &part]) {
            return Ok(Err(status));
        }
        ctx.log.line(&format!("Quick wipe complete. Partition: {part}"));
        Ok(Ok((part, zeroed)))
    }
}

impl Wiper for UsbQuickWiper {
    fn wipe(&self, ctx: &mut WipeContext<'_>) -> Result<WipeOutcome> {
        ctx.log.line(&format!("Starting quick wipe on {}", ctx.device.path));
        if let Err(e) = require_tools(ctx.runner, &TOOLS) {
            ctx.log.line(&format!("{e}"));
            return Ok(WipeOutcome::failed(WipeMethod::Quick, STATUS_FAILED));
        }

        match Self::run(ctx)? {
            Ok((part, zeroed)) => Ok(WipeOutcome {
                success: true,
                status: format!("usb_quick_wipe_ok:{part}"),
                effective_method: WipeMethod::Quick,
                category: NistCategory::Clear,
                passes: 1,
                bytes_written: zeroed,
                final_pattern: None,
                verifiable: false,
                metadata: None,
            }),
            Err(status) => Ok(WipeOutcome::failed(WipeMethod::Quick, status)),
        }
    }

    fn method(&self) -> WipeMethod {
        WipeMethod::Quick
    }
}
