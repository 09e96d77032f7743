//! Output file helpers.

use crate::error::{IoError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reads a UTF-8 file.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] or [`IoError::ReadFailed`].
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path_ref = path.as_ref();
    let path_str = path_ref.to_string_lossy().to_string();
    if !path_ref.exists() {
        return Err(IoError::FileNotFound { path: path_str }.into());
    }
    std::fs::read_to_string(path_ref).map_err(|e| {
        IoError::ReadFailed {
            path: path_str,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Writes content to a file, creating parent directories if needed.
///
/// # Errors
///
/// Returns an error if directory creation or file writing fails.
pub fn write_file<P: AsRef<Path>>(path: P, content: impl AsRef<[u8]>) -> Result<()> {
    let path_ref = path.as_ref();

    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }

    std::fs::write(path_ref, content).map_err(|e| IoError::WriteFailed {
        path: path_ref.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Creates `dir`, or `<tmp>/nullwipe/<leaf>` when `dir` is not writable.
///
/// # Errors
///
/// Returns an error if neither directory can be created.
pub fn ensure_dir_with_fallback(dir: &Path) -> Result<PathBuf> {
    match std::fs::create_dir_all(dir) {
        Ok(()) if is_writable(dir) => return Ok(dir.to_path_buf()),
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::PermissionDenied || e.kind() == ErrorKind::ReadOnlyFilesystem => {}
        Err(e) => {
            return Err(IoError::DirectoryFailed {
                path: dir.to_string_lossy().to_string(),
                reason: e.to_string(),
            }
            .into());
        }
    }

    let leaf = dir.file_name().map_or_else(|| "out".into(), std::ffi::OsStr::to_os_string);
    let fallback = std::env::temp_dir().join("nullwipe").join(leaf);
    tracing::warn!(
        wanted = %dir.display(),
        using = %fallback.display(),
        "directory not writable, falling back to temp"
    );
    std::fs::create_dir_all(&fallback).map_err(|e| IoError::DirectoryFailed {
        path: fallback.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;
    Ok(fallback)
}

fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(format!(".nullwipe-probe-{}", std::process::id()));
    let ok = std::fs::write(&probe, b"").is_ok();
    let _ = std::fs::remove_file(&probe);
    ok
}

/// Lowercase hex SHA-256 of a file's content.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file<P: AsRef<Path>>(path: P) -> Result<String> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let path_ref = path.as_ref();
    let mut file = std::fs::File::open(path_ref).map_err(|e| IoError::ReadFailed {
        path: path_ref.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
