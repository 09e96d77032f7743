//! Wipe job lifecycle.
//!
//! A job moves through a fixed sequence of states. Attestation and
//! verification may be skipped; failure and cancellation are reachable from
//! every non-terminal state. Anything else is rejected with
//! [`Error::InvalidState`].

use crate::core::device::Device;
use crate::core::method::{VerifyMode, WipeMethod};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Progress state of a wipe job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, nothing done yet.
    Pending,
    /// Running pre-wipe attestation.
    Attesting,
    /// Unmounting partitions.
    Unmounting,
    /// Writing or issuing erase commands.
    Wiping,
    /// Reading back.
    Verifying,
    /// Building and signing the certificate.
    Certifying,
    /// Finished.
    Completed,
    /// Stopped on error.
    Failed,
    /// Stopped by the operator.
    Cancelled,
}

impl JobState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether moving to `next` is allowed.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        use JobState::{
            Attesting, Cancelled, Certifying, Completed, Failed, Pending, Unmounting, Verifying,
            Wiping,
        };
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed | Cancelled)
                | (Pending, Attesting | Unmounting)
                | (Attesting, Unmounting)
                | (Unmounting, Wiping)
                | (Wiping, Verifying | Certifying)
                | (Verifying, Certifying)
                | (Certifying, Completed)
        )
    }

    /// Snake-case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Attesting => "attesting",
            Self::Unmounting => "unmounting",
            Self::Wiping => "wiping",
            Self::Verifying => "verifying",
            Self::Certifying => "certifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single device sanitization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeJob {
    /// Run identifier.
    pub id: Uuid,
    /// Target device.
    pub device: Device,
    /// Method the operator asked for.
    pub requested_method: WipeMethod,
    /// Method that actually ran (after auto resolution and fallbacks).
    pub effective_method: WipeMethod,
    /// Verification depth.
    pub verify_mode: VerifyMode,
    /// Current state.
    pub state: JobState,
    /// Every state entered, in order, starting with `Pending`.
    pub history: Vec<JobState>,
    /// Status code of the wipe step, e.g. `secure_erase_ok`.
    pub status: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl WipeJob {
    /// Creates a pending job.
    #[must_use]
    pub fn new(device: Device, method: WipeMethod, verify_mode: VerifyMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            device,
            requested_method: method,
            effective_method: method,
            verify_mode,
            state: JobState::Pending,
            history: vec![JobState::Pending],
            status: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Moves the job to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the transition is not allowed.
    pub fn transition(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition(next) {
            return Err(Error::InvalidState {
                message: format!("cannot move wipe job from {} to {next}", self.state),
            });
        }
        tracing::debug!(job = %self.id, from = %self.state, to = %next, "job transition");
        self.state = next;
        self.history.push(next);
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Moves to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            let _ = self.transition(JobState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::DeviceKind;
    use test_case::test_case;

    fn job() -> WipeJob {
        WipeJob::new(
            Device::new("/dev/sdz", DeviceKind::Ata),
            WipeMethod::Zero,
            VerifyMode::Sampled,
        )
    }

    #[test]
    fn test_full_lifecycle() {
        let mut job = job();
        for state in [
            JobState::Attesting,
            JobState::Unmounting,
            JobState::Wiping,
            JobState::Verifying,
            JobState::Certifying,
            JobState::Completed,
        ] {
            job.transition(state).unwrap();
        }
        assert_eq!(job.history.len(), 7);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_skip_attest_and_verify() {
        let mut job = job();
        job.transition(JobState::Unmounting).unwrap();
        job.transition(JobState::Wiping).unwrap();
        job.transition(JobState::Certifying).unwrap();
        job.transition(JobState::Completed).unwrap();
        assert_eq!(job.state, JobState::Completed);
    }

    #[test_case(JobState::Pending, JobState::Wiping)]
    #[test_case(JobState::Wiping, JobState::Completed)]
    #[test_case(JobState::Verifying, JobState::Wiping)]
    #[test_case(JobState::Completed, JobState::Failed)]
    #[test_case(JobState::Cancelled, JobState::Pending)]
    fn test_rejected_transitions(from: JobState, to: JobState) {
        assert!(!from.can_transition(to));
    }

    #[test]
    fn test_transition_error() {
        let mut job = job();
        let err = job.transition(JobState::Completed).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert!(err.to_string().contains("pending"));
        assert_eq!(job.state, JobState::Pending);
    }

    #[test]
    fn test_fail_from_any_active_state() {
        let mut job = job();
        job.transition(JobState::Unmounting).unwrap();
        job.transition(JobState::Wiping).unwrap();
        job.fail();
        assert_eq!(job.state, JobState::Failed);
        job.fail();
        assert_eq!(job.history.last(), Some(&JobState::Failed));
        assert_eq!(job.history.len(), 4);
    }
}
