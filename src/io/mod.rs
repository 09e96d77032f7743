//! I/O utilities for nullwipe.
//!
//! Positional read/write access to wipe targets, plus helpers for the
//! certificate, key and log files written alongside a run.

pub mod files;
pub mod target;

pub use files::{ensure_dir_with_fallback, read_file, sha256_file, write_file};
pub use target::TargetFile;
