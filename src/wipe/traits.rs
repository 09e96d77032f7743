//! Wiper trait and shared run context.

use crate::config::Settings;
use crate::core::device::{Device, DeviceMetadata};
use crate::core::method::{NistCategory, WipeMethod, methods_for};
use crate::error::{Result, WipeError};
use crate::system::runner::CommandRunner;
use crate::wipe::log::WipeLog;
use crate::wipe::pattern::Pattern;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared cancellation flag.
///
/// Cloning shares the flag; cancelling any clone stops every worker at its
/// next block boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fails with [`WipeError::Cancelled`] once cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`WipeError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(WipeError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

/// Everything a wiper needs for one device.
pub struct WipeContext<'a> {
    /// Target device.
    pub device: &'a Device,
    /// Engine settings.
    pub settings: &'a Settings,
    /// External command runner.
    pub runner: &'a dyn CommandRunner,
    /// Cancellation flag.
    pub cancel: &'a CancelToken,
    /// Per-run log.
    pub log: &'a mut WipeLog,
}

impl WipeContext<'_> {
    /// Timeout for short external commands.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.wipe.command_timeout_secs)
    }

    /// Timeout for hardware erase commands.
    #[must_use]
    pub const fn erase_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.wipe.erase_timeout_secs)
    }
}

/// Result of a wipe step.
///
/// Failures after the wipe started are reported here, not as errors, so a
/// certificate can still record them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipeOutcome {
    /// Whether the data was sanitized.
    pub success: bool,
    /// Status code, e.g. `secure_erase_ok` or `frozen`.
    pub status: String,
    /// Method that actually ran.
    pub effective_method: WipeMethod,
    /// Category achieved. Purge only when a hardware purge succeeded.
    pub category: NistCategory,
    /// Overwrite passes completed (1 for single-command erases).
    pub passes: u32,
    /// Bytes written by native passes.
    pub bytes_written: u64,
    /// Pattern of the last completed pass, when it can be verified.
    pub final_pattern: Option<Pattern>,
    /// Whether read-back verification makes sense afterwards.
    pub verifiable: bool,
    /// Metadata discovered by the wiper itself (Android).
    pub metadata: Option<DeviceMetadata>,
}

impl WipeOutcome {
    /// A failed outcome with no data written.
    #[must_use]
    pub fn failed(method: WipeMethod, status: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
            effective_method: method,
            category: NistCategory::Clear,
            passes: 0,
            bytes_written: 0,
            final_pattern: None,
            verifiable: false,
            metadata: None,
        }
    }

    /// A successful hardware purge. User data reads back as zeros afterwards.
    #[must_use]
    pub fn purged(method: WipeMethod, status: impl Into<String>) -> Self {
        Self {
            success: true,
            status: status.into(),
            effective_method: method,
            category: NistCategory::Purge,
            passes: 1,
            bytes_written: 0,
            final_pattern: Some(Pattern::Zero),
            verifiable: true,
            metadata: None,
        }
    }
}

/// A sanitization strategy.
pub trait Wiper: Send + Sync {
    /// Runs the wipe.
    ///
    /// # Errors
    ///
    /// Returns an error for precondition failures and cancellation. Failures
    /// of the wipe itself come back as an unsuccessful [`WipeOutcome`].
    fn wipe(&self, ctx: &mut WipeContext<'_>) -> Result<WipeOutcome>;

    /// Method implemented by this wiper.
    fn method(&self) -> WipeMethod;

    /// Name of the strategy.
    fn name(&self) -> &'static str {
        self.method().as_str()
    }

    /// Description of the strategy.
    fn description(&self) -> &'static str {
        self.method().description()
    }

    /// Checks that the method applies to `device`.
    ///
    /// # Errors
    ///
    /// Returns [`WipeError::Unsupported`] if the device kind does not offer
    /// this method.
    fn validate(&self, device: &Device) -> Result<()> {
        if methods_for(device.kind).contains(&self.method()) {
            Ok(())
        } else {
            Err(WipeError::Unsupported {
                method: self.method().to_string(),
                kind: device.kind.to_string(),
            }
            .into())
        }
    }
}
