//! Post-wipe read-back verification.
//!
//! Sampled mode reads a fixed number of windows, always including the first
//! and last window of the target. Full mode reads everything. Both compare
//! against the pattern of the final pass and hash every byte read, in order,
//! into the digest recorded on the certificate.

use crate::config::WipeSettings;
use crate::core::method::VerifyMode;
use crate::error::{Error, Result};
use crate::io::TargetFile;
use crate::wipe::pattern::Pattern;
use crate::wipe::traits::CancelToken;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Result of a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Mode that ran.
    pub mode: VerifyMode,
    /// Every byte read matched.
    pub passed: bool,
    /// Windows (sampled) or blocks (full) read.
    pub samples: usize,
    /// Bytes compared.
    pub bytes_checked: u64,
    /// Offset of the first differing byte.
    pub first_mismatch: Option<u64>,
    /// Lowercase hex SHA-256 of the bytes read.
    pub digest: String,
}

/// Verifies the target at `path`.
///
/// # Errors
///
/// Returns an error if the target cannot be read, the run is cancelled, or
/// `mode` is [`VerifyMode::None`].
pub fn verify_path(
    path: &str,
    mode: VerifyMode,
    pattern: &Pattern,
    settings: &WipeSettings,
    cancel: &CancelToken,
) -> Result<VerificationReport> {
    let target = TargetFile::open_read(path)?;
    verify(&target, mode, pattern, settings, cancel)
}

/// Verifies an open target.
///
/// # Errors
///
/// Same as [`verify_path`].
pub fn verify(
    target: &TargetFile,
    mode: VerifyMode,
    pattern: &Pattern,
    settings: &WipeSettings,
    cancel: &CancelToken,
) -> Result<VerificationReport> {
    match mode {
        VerifyMode::None => Err(Error::InvalidState {
            message: "verification requested with mode none".to_string(),
        }),
        VerifyMode::Full => verify_full(target, pattern, settings, cancel),
        VerifyMode::Sampled if target.size() <= settings.sample_len as u64 => {
            let mut report = verify_full(target, pattern, settings, cancel)?;
            report.mode = VerifyMode::Sampled;
            Ok(report)
        }
        VerifyMode::Sampled => verify_sampled(target, pattern, settings, cancel),
    }
}

/// Window offsets for sampled verification: first, last, then random.
#[must_use]
pub fn sample_offsets(size: u64, count: usize, len: usize) -> Vec<u64> {
    let len = len as u64;
    if size <= len {
        return vec![0];
    }
    let last = size - len;
    let mut offsets = vec![0, last];
    while offsets.len() < count.max(2) {
        offsets.push(rand::random_range(0..last));
    }
    offsets.sort_unstable();
    offsets
}

fn verify_sampled(
    target: &TargetFile,
    pattern: &Pattern,
    settings: &WipeSettings,
    cancel: &CancelToken,
) -> Result<VerificationReport> {
    let offsets = sample_offsets(target.size(), settings.sample_count, settings.sample_len);
    let mut checker = Checker::new(VerifyMode::Sampled, settings.sample_len);
    for offset in offsets {
        cancel.check()?;
        if !checker.check(target, offset, settings.sample_len, pattern, settings.block_size)? {
            tracing::warn!(device = target.path(), offset, "unexpected data during verification");
        }
    }
    Ok(checker.finish())
}

fn verify_full(
    target: &TargetFile,
    pattern: &Pattern,
    settings: &WipeSettings,
    cancel: &CancelToken,
) -> Result<VerificationReport> {
    let size = target.size();
    let mut checker = Checker::new(VerifyMode::Full, settings.block_size);
    let mut offset = 0u64;
    while offset < size {
        cancel.check()?;
        let len = usize::try_from((size - offset).min(settings.block_size as u64)).unwrap_or(settings.block_size);
        if !checker.check(target, offset, len, pattern, settings.block_size)? {
            tracing::warn!(device = target.path(), offset, "unexpected data during full verification");
            break;
        }
        offset += len as u64;
    }
    Ok(checker.finish())
}

struct Checker {
    mode: VerifyMode,
    hasher: Sha256,
    actual: Vec<u8>,
    expected: Vec<u8>,
    samples: usize,
    bytes_checked: u64,
    first_mismatch: Option<u64>,
}

impl Checker {
    fn new(mode: VerifyMode, capacity: usize) -> Self {
        Self {
            mode,
            hasher: Sha256::new(),
            actual: vec![0; capacity],
            expected: vec![0; capacity],
            samples: 0,
            bytes_checked: 0,
            first_mismatch: None,
        }
    }

    /// Reads and compares one window. Returns whether it matched.
    fn check(
        &mut self,
        target: &TargetFile,
        offset: u64,
        len: usize,
        pattern: &Pattern,
        block_size: usize,
    ) -> Result<bool> {
        self.actual.resize(len, 0);
        self.expected.resize(len, 0);
        target.read_block(offset, &mut self.actual)?;
        pattern.expected_at(offset, block_size, &mut self.expected);

        self.hasher.update(&self.actual);
        self.samples += 1;
        self.bytes_checked += len as u64;

        let mismatch = self
            .actual
            .iter()
            .zip(&self.expected)
            .position(|(a, e)| a != e);
        if let Some(pos) = mismatch {
            let at = offset + pos as u64;
            self.first_mismatch = Some(self.first_mismatch.map_or(at, |m| m.min(at)));
            return Ok(false);
        }
        Ok(true)
    }

    fn finish(self) -> VerificationReport {
        VerificationReport {
            mode: self.mode,
            passed: self.first_mismatch.is_none() && self.samples > 0,
            samples: self.samples,
            bytes_checked: self.bytes_checked,
            first_mismatch: self.first_mismatch,
            digest: hex::encode(self.hasher.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn settings() -> WipeSettings {
        WipeSettings {
            block_size: 1024,
            sample_len: 256,
            sample_count: 8,
            ..WipeSettings::default()
        }
    }

    fn zero_image(len: usize) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![0u8; len]).unwrap();
        file
    }

    #[test]
    fn test_sample_offsets_include_ends() {
        let offsets = sample_offsets(10_000, 16, 4096);
        assert_eq!(offsets.len(), 16);
        assert_eq!(offsets[0], 0);
        assert_eq!(*offsets.last().unwrap(), 10_000 - 4096);
        assert!(offsets.iter().all(|&o| o <= 10_000 - 4096));
    }

    #[test]
    fn test_sample_offsets_tiny_target() {
        assert_eq!(sample_offsets(100, 16, 4096), vec![0]);
    }

    #[test]
    fn test_full_passes_on_zeros() {
        let img = zero_image(5_000);
        let target = TargetFile::open_read(img.path()).unwrap();
        let report = verify(&target, VerifyMode::Full, &Pattern::Zero, &settings(), &CancelToken::new()).unwrap();
        assert!(report.passed);
        assert_eq!(report.bytes_checked, 5_000);
        assert_eq!(report.samples, 5);
        assert_eq!(report.digest.len(), 64);
    }

    #[test]
    fn test_full_reports_first_mismatch() {
        let img = zero_image(5_000);
        let mut data = std::fs::read(img.path()).unwrap();
        data[3_333] = 1;
        std::fs::write(img.path(), &data).unwrap();

        let target = TargetFile::open_read(img.path()).unwrap();
        let report = verify(&target, VerifyMode::Full, &Pattern::Zero, &settings(), &CancelToken::new()).unwrap();
        assert!(!report.passed);
        assert_eq!(report.first_mismatch, Some(3_333));
    }

    #[test]
    fn test_sampled_catches_dirty_tail() {
        let img = zero_image(8_192);
        let mut data = std::fs::read(img.path()).unwrap();
        data[8_191] = 0xEE;
        std::fs::write(img.path(), &data).unwrap();

        let target = TargetFile::open_read(img.path()).unwrap();
        let report = verify(&target, VerifyMode::Sampled, &Pattern::Zero, &settings(), &CancelToken::new()).unwrap();
        assert!(!report.passed);
        assert_eq!(report.first_mismatch, Some(8_191));
        assert_eq!(report.samples, 8);
    }

    #[test]
    fn test_sampled_keystream() {
        let pattern = Pattern::Keystream { seed: [3u8; 32] };
        let file = NamedTempFile::new().unwrap();
        let mut data = vec![0u8; 6_000];
        pattern.expected_at(0, 1024, &mut data);
        std::fs::write(file.path(), &data).unwrap();

        let report = verify_path(
            &file.path().to_string_lossy(),
            VerifyMode::Sampled,
            &pattern,
            &settings(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(report.passed);
    }

    #[test]
    fn test_small_target_sampled_reads_everything() {
        let img = zero_image(100);
        let target = TargetFile::open_read(img.path()).unwrap();
        let report = verify(&target, VerifyMode::Sampled, &Pattern::Zero, &settings(), &CancelToken::new()).unwrap();
        assert!(report.passed);
        assert_eq!(report.mode, VerifyMode::Sampled);
        assert_eq!(report.bytes_checked, 100);
    }

    #[test]
    fn test_mode_none_is_error() {
        let img = zero_image(100);
        let target = TargetFile::open_read(img.path()).unwrap();
        assert!(verify(&target, VerifyMode::None, &Pattern::Zero, &settings(), &CancelToken::new()).is_err());
    }

    #[test]
    fn test_cancelled() {
        let img = zero_image(4_096);
        let target = TargetFile::open_read(img.path()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(verify(&target, VerifyMode::Full, &Pattern::Zero, &settings(), &cancel).is_err());
    }
}
