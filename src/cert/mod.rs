//! Certificates of sanitization.
//!
//! Certificates are canonical JSON signed with Ed25519. The signed envelope
//! is also packed into a URL fragment for the offline verifier page.

pub mod canonical;
pub mod issue;
pub mod payload;
#[cfg(feature = "upload")]
pub mod publish;
pub mod record;
pub mod render;
pub mod sign;
pub mod verifier;

pub use canonical::{canonical_json, canonical_json_of};
pub use issue::{IssueOptions, IssuedCertificate, Issuer};
pub use payload::{Envelope, decode_fragment, encode_fragment, extract_fragment, verifier_url};
pub use record::Certificate;
pub use render::render_text;
pub use sign::{KeyPaths, generate_keypair, load_signing_key, load_verifying_key, sign_value, verify_value};
pub use verifier::{VerifyOutcome, load_envelope, verify_envelope};
