//! # nullwipe
//!
//! NIST SP 800-88 aware storage sanitization.
//!
//! nullwipe wipes hard drives, SSDs, NVMe namespaces, USB sticks and Android
//! handsets, issues an Ed25519-signed certificate for every run and appends
//! each outcome to a Merkle-rooted audit chain.
//!
//! ## Features
//!
//! - **Methods**: native overwrite (zero, random, shred), ATA Secure Erase,
//!   NVMe Sanitize, USB quick wipe and fastboot userdata erase
//! - **Verification**: sampled or full read-back after every overwrite
//! - **Certificates**: canonical JSON, detached signatures and an offline
//!   verifier URL
//! - **Zero-trust checks**: operator identity, forensic process scan and a
//!   media policy before any write
//! - **`SQLite` Storage**: runs, certificates and the audit chain

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod audit;
pub mod cert;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod storage;
pub mod system;
pub mod verify;
pub mod wipe;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{Device, DeviceKind, JobState, NistCategory, VerifyMode, WipeJob, WipeMethod};

// Re-export configuration
pub use config::Settings;

// Re-export storage types
pub use storage::{DEFAULT_DB_PATH, SqliteStorage, Storage};

// Re-export engine types
pub use wipe::{WipeEngine, WipePlan, WipeReport, WipeRequest, available_methods, run_many};

// Re-export certificate and audit types
pub use audit::{AuditChain, AuditRecord, Attestor, compute_merkle_root};
pub use cert::{Certificate, Envelope, Issuer, verify_envelope};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
