//! Zero-trust attestation and the tamper-evident audit trail.

pub mod attest;
pub mod chain;
pub mod merkle;
pub mod record;

pub use attest::{AttestationResult, Attestor};
pub use chain::{AppendedEntry, AuditChain, ChainStatus, GENESIS_ROOT, import_hashes};
pub use merkle::{compute_merkle_root, sha256_hex};
pub use record::{AUDIT_VERSION, AuditRecord, WipeStatus};
