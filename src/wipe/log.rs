//! Per-run wipe log files.
//!
//! Each run appends timestamped lines and raw tool output to
//! `wipe_<device>_<unix-ts>.log`. The log is best-effort: write failures
//! never abort a wipe.

use crate::core::device::basename;
use crate::error::Result;
use crate::io::ensure_dir_with_fallback;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only log for one run.
#[derive(Debug)]
pub struct WipeLog {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl WipeLog {
    /// Creates a log for `device` inside `dir` (temp fallback if unwritable).
    ///
    /// # Errors
    ///
    /// Returns an error if neither `dir` nor the fallback can hold the file.
    pub fn create(dir: &Path, device: &str) -> Result<Self> {
        let dir = ensure_dir_with_fallback(dir)?;
        let name = format!("wipe_{}_{}.log", basename(device), Utc::now().timestamp());
        let path = dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "wipe log opened");
        Ok(Self {
            path: Some(path),
            file: Some(file),
        })
    }

    /// A log that writes nowhere.
    #[must_use]
    pub const fn discard() -> Self {
        Self {
            path: None,
            file: None,
        }
    }

    /// Log file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends a timestamped line.
    pub fn line(&mut self, message: &str) {
        tracing::debug!("{message}");
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "[{}] {message}", Utc::now().to_rfc3339());
        }
    }

    /// Appends text verbatim, e.g. tool output.
    pub fn raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(text.as_bytes());
            if !text.ends_with('\n') {
                let _ = file.write_all(b"\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_lines_and_raw() {
        let dir = TempDir::new().unwrap();
        let mut log = WipeLog::create(dir.path(), "/dev/sdb").unwrap();
        log.line("Starting quick wipe");
        log.raw("wipefs output");

        let path = log.path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("wipe_sdb_"));
        assert!(name.ends_with(".log"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("] Starting quick wipe\n"));
        assert!(content.ends_with("wipefs output\n"));
    }

    #[test]
    fn test_discard_has_no_path() {
        let mut log = WipeLog::discard();
        log.line("ignored");
        assert!(log.path().is_none());
    }
}
