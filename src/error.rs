//! Error types for nullwipe operations.
//!
//! This module provides the error hierarchy, built with `thiserror`, for
//! device probing, wiping, certificates, auditing, storage, I/O, and CLI commands.

use thiserror::Error;

/// Result type alias for nullwipe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Device discovery and access errors.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Sanitization errors.
    #[error("wipe error: {0}")]
    Wipe(#[from] WipeError),

    /// Certificate signing, encoding and verification errors.
    #[error("certificate error: {0}")]
    Certificate(#[from] CertError),

    /// Attestation and audit chain errors.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Errors raised while finding or opening storage devices.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Device path does not exist.
    #[error("device not found: {path}")]
    NotFound {
        /// Path that was not found.
        path: String,
    },

    /// Probing output could not be interpreted.
    #[error("device probe failed: {0}")]
    Probe(String),

    /// A required external tool is not installed.
    #[error("required tool not found in PATH: {tool}")]
    ToolMissing {
        /// Tool name.
        tool: String,
    },

    /// The process lacks permission to open the device.
    #[error("permission denied: {path} (run as root)")]
    PermissionDenied {
        /// Device path.
        path: String,
    },
}

/// Errors raised during a wipe.
#[derive(Error, Debug)]
pub enum WipeError {
    /// The run was cancelled by the operator.
    #[error("wipe cancelled by user")]
    Cancelled,

    /// Method cannot be applied to this kind of device.
    #[error("method {method} is not supported on {kind} devices")]
    Unsupported {
        /// Requested method.
        method: String,
        /// Detected device kind.
        kind: String,
    },

    /// An external step exceeded its time limit.
    #[error("{step} timed out after {secs}s")]
    Timeout {
        /// Step name.
        step: String,
        /// Timeout in seconds.
        secs: u64,
    },

    /// A block write failed after all retries.
    #[error("write failed at offset {offset}: {reason}")]
    WriteFailed {
        /// Byte offset of the failed block.
        offset: u64,
        /// Underlying error message.
        reason: String,
    },
}

/// Certificate-specific errors.
#[derive(Error, Debug)]
pub enum CertError {
    /// Key file does not exist.
    #[error("key not found: {path}. Run: nullwipe keygen")]
    KeyMissing {
        /// Expected key path.
        path: String,
    },

    /// Key material could not be decoded.
    #[error("invalid key: {0}")]
    KeyInvalid(String),

    /// Signature did not verify.
    #[error("signature is invalid")]
    SignatureInvalid,

    /// Base64, zlib or JSON payload decoding failed.
    #[error("payload encoding error: {0}")]
    Encoding(String),

    /// Envelope lacks `cert` or `sig`.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Certificate not found by UUID.
    #[error("certificate not found: {uuid}")]
    NotFound {
        /// Certificate UUID.
        uuid: String,
    },
}

/// Attestation and audit chain errors.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Pre-wipe attestation refused the run.
    #[error("attestation denied: {reason}")]
    AttestationDenied {
        /// Reason for denial.
        reason: String,
    },

    /// Stored chain does not match recomputed hashes.
    #[error("audit chain broken at entry {seq}")]
    ChainBroken {
        /// First inconsistent sequence number.
        seq: i64,
    },

    /// Operator identity is required.
    #[error("operator identity is required")]
    EmptyOperator,
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized (init command not run).
    #[error("nullwipe not initialized. Run: nullwipe init")]
    NotInitialized,

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

// Implement From traits for library errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(StorageError::Serialization(err.to_string()))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
