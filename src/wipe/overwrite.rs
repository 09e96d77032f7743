//! Native overwrite passes (NIST Clear).
//!
//! Each pass writes the whole target block by block and syncs at the end.
//! Cancellation is checked before every block. A device that reports
//! `ENOSPC` before its nominal size ends the pass early.

use crate::config::WipeSettings;
use crate::core::method::{NistCategory, WipeMethod};
use crate::error::{Error, Result, WipeError};
use crate::io::TargetFile;
use crate::wipe::log::WipeLog;
use crate::wipe::pattern::Pattern;
use crate::wipe::traits::{CancelToken, WipeContext, WipeOutcome, Wiper};

/// Sequence of passes to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwritePlan {
    /// Patterns in write order.
    pub passes: Vec<Pattern>,
    /// Bytes per write.
    pub block_size: usize,
    /// Extra attempts for a failed block.
    pub write_retries: u32,
}

impl OverwritePlan {
    /// Plan for an overwrite method, or `None` for hardware methods.
    #[must_use]
    pub fn for_method(method: WipeMethod, settings: &WipeSettings) -> Option<Self> {
        let passes = match method {
            WipeMethod::Zero => vec![Pattern::Zero],
            WipeMethod::Random => vec![Pattern::random()],
            WipeMethod::Shred => {
                let mut passes: Vec<Pattern> =
                    (0..settings.shred_passes).map(|_| Pattern::random()).collect();
                passes.push(Pattern::Zero);
                passes
            }
            _ => return None,
        };
        Some(Self::with_passes(passes, settings))
    }

    /// `count` random passes.
    #[must_use]
    pub fn random(count: u32, settings: &WipeSettings) -> Self {
        Self::with_passes((0..count.max(1)).map(|_| Pattern::random()).collect(), settings)
    }

    fn with_passes(passes: Vec<Pattern>, settings: &WipeSettings) -> Self {
        Self {
            passes,
            block_size: settings.block_size,
            write_retries: settings.write_retries,
        }
    }
}

/// What a plan run achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwriteReport {
    /// Passes fully written.
    pub passes_completed: u32,
    /// Total bytes written across passes.
    pub bytes_written: u64,
    /// Pattern of the last pass.
    pub final_pattern: Option<Pattern>,
}

/// Writes every pass of `plan` to `target`.
///
/// # Errors
///
/// Returns [`WipeError::Cancelled`] when cancelled and
/// [`WipeError::WriteFailed`] when a block fails after all retries.
pub fn run_plan(
    target: &TargetFile,
    plan: &OverwritePlan,
    cancel: &CancelToken,
    log: &mut WipeLog,
) -> Result<OverwriteReport> {
    let total = u32::try_from(plan.passes.len()).unwrap_or(u32::MAX);
    let mut report = OverwriteReport {
        passes_completed: 0,
        bytes_written: 0,
        final_pattern: None,
    };

    for (i, pattern) in plan.passes.iter().enumerate() {
        let pass = u32::try_from(i).unwrap_or(u32::MAX) + 1;
        log.line(&format!("Pass {pass}/{total}: writing {} pattern", pattern.name()));
        match run_pass(target, pattern, plan, cancel, log) {
            Ok(written) => {
                report.bytes_written += written;
                report.passes_completed = pass;
                report.final_pattern = Some(*pattern);
                tracing::info!(device = target.path(), pass, total, "pass complete");
            }
            Err(e) => {
                log.line(&format!(
                    "Stopped during pass {pass}/{total} after {} bytes: {e}",
                    report.bytes_written
                ));
                return Err(e);
            }
        }
    }
    Ok(report)
}

fn run_pass(
    target: &TargetFile,
    pattern: &Pattern,
    plan: &OverwritePlan,
    cancel: &CancelToken,
    log: &mut WipeLog,
) -> Result<u64> {
    let size = target.size();
    let mut buf = vec![0u8; plan.block_size];
    let mut offset = 0u64;
    let mut index = 0u64;
    let mut next_report = 10u64;

    while offset < size {
        cancel.check()?;
        let len = usize::try_from((size - offset).min(plan.block_size as u64)).unwrap_or(plan.block_size);
        let chunk = &mut buf[..len];
        pattern.fill(index, chunk);

        let written = write_with_retry(target, offset, chunk, plan.write_retries, log)?;
        offset += written as u64;
        if written < len {
            log.line(&format!("Device full at offset {offset}, ending pass"));
            break;
        }
        index += 1;

        let pct = offset * 100 / size;
        if pct >= next_report {
            log.line(&format!("{pct}% ({offset}/{size} bytes)"));
            next_report = (pct / 10 + 1) * 10;
        }
    }

    target.sync()?;
    Ok(offset)
}

fn write_with_retry(
    target: &TargetFile,
    offset: u64,
    chunk: &[u8],
    retries: u32,
    log: &mut WipeLog,
) -> Result<usize> {
    let mut attempt = 0;
    loop {
        match target.write_block(offset, chunk) {
            Ok(n) => return Ok(n),
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(offset, attempt, error = %e, "block write failed, retrying");
                log.line(&format!("Write error at offset {offset} ({e}), retry {attempt}/{retries}"));
            }
            Err(e) => {
                return Err(WipeError::WriteFailed {
                    offset,
                    reason: e.to_string(),
                }
                .into());
            }
        }
    }
}

/// Zeroes `len` bytes starting at `offset`, clamped to the target size.
///
/// # Errors
///
/// Returns an error if a block cannot be written.
pub fn zero_range(target: &TargetFile, offset: u64, len: u64, block_size: usize) -> Result<u64> {
    let end = offset.saturating_add(len).min(target.size());
    let buf = vec![0u8; block_size];
    let mut pos = offset;
    while pos < end {
        let take = usize::try_from((end - pos).min(block_size as u64)).unwrap_or(block_size);
        let written = target
            .write_block(pos, &buf[..take])
            .map_err(|e| WipeError::WriteFailed {
                offset: pos,
                reason: e.to_string(),
            })?;
        if written == 0 {
            break;
        }
        pos += written as u64;
    }
    target.sync()?;
    Ok(pos.saturating_sub(offset))
}

/// Runs `plan` on the context's device and turns the result into an outcome.
///
/// Cancellation and open failures propagate; write failures become an
/// unsuccessful outcome with status `<prefix>_failed`.
pub(crate) fn overwrite_outcome(
    ctx: &mut WipeContext<'_>,
    plan: &OverwritePlan,
    method: WipeMethod,
    status_prefix: &str,
) -> Result<WipeOutcome> {
    let target = TargetFile::open(&ctx.device.path)?;
    ctx.log.line(&format!(
        "Starting {} overwrite on {} ({} bytes, {} pass(es), {} byte blocks)",
        method,
        ctx.device.path,
        target.size(),
        plan.passes.len(),
        plan.block_size
    ));

    match run_plan(&target, plan, ctx.cancel, ctx.log) {
        Ok(report) => {
            ctx.log.line("Overwrite complete.");
            Ok(WipeOutcome {
                success: true,
                status: format!("{status_prefix}_ok"),
                effective_method: method,
                category: NistCategory::Clear,
                passes: report.passes_completed,
                bytes_written: report.bytes_written,
                final_pattern: report.final_pattern,
                verifiable: true,
                metadata: None,
            })
        }
        Err(Error::Wipe(WipeError::Cancelled)) => Err(WipeError::Cancelled.into()),
        Err(e) => {
            tracing::error!(device = %ctx.device.path, error = %e, "overwrite failed");
            ctx.log.line(&format!("Overwrite error: {e}"));
            Ok(WipeOutcome::failed(method, format!("{status_prefix}_failed")))
        }
    }
}

/// Zero, random and shred overwrites.
#[derive(Debug, Clone, Copy)]
pub struct OverwriteWiper {
    method: WipeMethod,
}

impl OverwriteWiper {
    /// Creates a wiper for an overwrite method.
    ///
    /// # Errors
    ///
    /// Returns [`WipeError::Unsupported`] for non-overwrite methods.
    pub fn new(method: WipeMethod) -> Result<Self> {
        if matches!(method, WipeMethod::Zero | WipeMethod::Random | WipeMethod::Shred) {
            Ok(Self { method })
        } else {
            Err(WipeError::Unsupported {
                method: method.to_string(),
                kind: "overwrite".to_string(),
            }
            .into())
        }
    }

    const fn status_prefix(&self) -> &'static str {
        match self.method {
            WipeMethod::Random => "random_fill",
            WipeMethod::Shred => "shred",
            _ => "zero_fill",
        }
    }
}

impl Wiper for OverwriteWiper {
    fn wipe(&self, ctx: &mut WipeContext<'_>) -> Result<WipeOutcome> {
        let plan = OverwritePlan::for_method(self.method, &ctx.settings.wipe).ok_or_else(|| {
            WipeError::Unsupported {
                method: self.method.to_string(),
                kind: ctx.device.kind.to_string(),
            }
        })?;
        overwrite_outcome(ctx, &plan, self.method, self.status_prefix())
    }

    fn method(&self) -> WipeMethod {
        self.method
    }
}
