//! Positional access to a wipe target.
//!
//! A target is either a block device node or a regular file (disk images).
//! Its size comes from seeking to the end, which works for both; file
//! metadata reports zero length for block devices.

use crate::error::{DeviceError, IoError, Result};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom};
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::path::Path;

const ENOSPC: i32 = 28;

/// An open wipe target.
#[derive(Debug)]
pub struct TargetFile {
    file: File,
    size: u64,
    path: String,
    block_device: bool,
}

impl TargetFile {
    /// Opens a target for reading and writing. Never truncates.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotFound`] or [`DeviceError::PermissionDenied`]
    /// when the path cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), true)
    }

    /// Opens a target read-only, for verification.
    ///
    /// # Errors
    ///
    /// Same as [`TargetFile::open`].
    pub fn open_read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), false)
    }

    fn open_with(path: &Path, write: bool) -> Result<Self> {
        let path_str = path.to_string_lossy().to_string();
        if !path.exists() {
            return Err(DeviceError::NotFound { path: path_str }.into());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(write)
            .open(path)
            .map_err(|e| open_error(&path_str, &e))?;

        let block_device = file.metadata().is_ok_and(|m| m.file_type().is_block_device());
        let size = file.seek(SeekFrom::End(0)).map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        file.rewind()?;

        Ok(Self {
            file,
            size,
            path: path_str,
            block_device,
        })
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Path the target was opened with.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the target is a block device node.
    #[must_use]
    pub const fn is_block_device(&self) -> bool {
        self.block_device
    }

    /// Writes `buf` at `offset`.
    ///
    /// Returns the bytes written. A short count means the device ran out of
    /// space; zero means nothing more fits.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error for anything other than a full device.
    pub fn write_block(&self, offset: u64, buf: &[u8]) -> std::io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            match self.file.write_at(&buf[written..], offset + written as u64) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if is_no_space(&e) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// Reads `buf.len()` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range cannot be read.
    pub fn read_block(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file
            .read_exact_at(buf, offset)
            .map_err(|e| IoError::ReadFailed {
                path: self.path.clone(),
                reason: format!("offset {offset}: {e}"),
            })?;
        Ok(())
    }

    /// Flushes written data to the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().map_err(|e| IoError::WriteFailed {
            path: self.path.clone(),
            reason: format!("sync: {e}"),
        })?;
        Ok(())
    }
}

fn is_no_space(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(ENOSPC) || err.kind() == ErrorKind::StorageFull
}

fn open_error(path: &str, err: &std::io::Error) -> crate::error::Error {
    match err.kind() {
        ErrorKind::PermissionDenied => DeviceError::PermissionDenied {
            path: path.to_string(),
        }
        .into(),
        ErrorKind::NotFound => DeviceError::NotFound {
            path: path.to_string(),
        }
        .into(),
        _ => IoError::ReadFailed {
            path: path.to_string(),
            reason: err.to_string(),
        }
        .into(),
    }
}
