//! Offline verification of signed envelopes.

use crate::cert::payload::{Envelope, decode_fragment, extract_fragment};
use crate::cert::sign::verify_value;
use crate::error::Result;
use crate::io::read_file;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Result of checking one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    /// Whether the signature matches the certificate.
    pub valid: bool,
    /// Certificate identifier, if present.
    pub uuid: Option<String>,
    /// Device the certificate is about, if present.
    pub device: Option<String>,
}

/// Checks the signature of `envelope` against `key`.
#[must_use]
pub fn verify_envelope(key: &VerifyingKey, envelope: &Envelope) -> VerifyOutcome {
    let field = |name: &str| envelope.cert.get(name).and_then(Value::as_str).map(ToString::to_string);
    let device = field("device").or_else(|| {
        envelope
            .cert
            .pointer("/MediaInformation/Source")
            .and_then(Value::as_str)
            .map(ToString::to_string)
    });
    VerifyOutcome {
        valid: verify_value(key, &envelope.cert, &envelope.sig),
        uuid: field("uuid"),
        device,
    }
}

/// Loads an envelope from a JSON file, a verifier URL, or a bare fragment.
///
/// An existing path is read as envelope JSON. Anything else is treated as a
/// URL or fragment.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the payload does not
/// decode to an envelope.
pub fn load_envelope(input: &str) -> Result<Envelope> {
    let trimmed = input.trim();
    if Path::new(trimmed).is_file() {
        let text = read_file(trimmed)?;
        return Envelope::from_json(&text);
    }
    decode_fragment(extract_fragment(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::payload::{encode_fragment, verifier_url};
    use crate::cert::sign::sign_value;
    use ed25519_dalek::SigningKey;
    use serde_json::json;
    use tempfile::TempDir;

    fn signed(cert: Value) -> (SigningKey, Envelope) {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let sig = sign_value(&key, &cert);
        (key, Envelope { cert, sig })
    }

    #[test]
    fn test_valid_envelope() {
        let (key, envelope) = signed(json!({"uuid": "u-9", "device": "/dev/sdb"}));
        let outcome = verify_envelope(&key.verifying_key(), &envelope);
        assert!(outcome.valid);
        assert_eq!(outcome.uuid.as_deref(), Some("u-9"));
        assert_eq!(outcome.device.as_deref(), Some("/dev/sdb"));
    }

    #[test]
    fn test_tampered_certificate() {
        let (key, mut envelope) = signed(json!({
            "uuid": "u-9",
            "SanitizationDetails": {"PostSanitizationClassification": "Failed"}
        }));
        envelope.cert["SanitizationDetails"]["PostSanitizationClassification"] = json!("Unclassified");
        assert!(!verify_envelope(&key.verifying_key(), &envelope).valid);
    }

    #[test]
    fn test_wrong_key() {
        let (_, envelope) = signed(json!({"uuid": "u"}));
        let other = SigningKey::from_bytes(&[4u8; 32]).verifying_key();
        assert!(!verify_envelope(&other, &envelope).valid);
    }

    #[test]
    fn test_device_from_media_source() {
        let (key, envelope) = signed(json!({"MediaInformation": {"Source": "/dev/sdd"}}));
        let outcome = verify_envelope(&key.verifying_key(), &envelope);
        assert_eq!(outcome.device.as_deref(), Some("/dev/sdd"));
        assert!(outcome.uuid.is_none());
    }

    #[test]
    fn test_load_from_file_url_and_fragment() {
        let (_, envelope) = signed(json!({"uuid": "u-1"}));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.json");
        std::fs::write(&path, envelope.to_value().to_string()).unwrap();
        assert_eq!(load_envelope(path.to_str().unwrap()).unwrap(), envelope);

        let fragment = encode_fragment(&envelope).unwrap();
        assert_eq!(load_envelope(&fragment).unwrap(), envelope);
        let url = verifier_url("https://nullbytes.github.io/Verifier_site", &fragment);
        assert_eq!(load_envelope(&url).unwrap(), envelope);
    }

    #[test]
    fn test_load_garbage() {
        assert!(load_envelope("definitely not a payload").is_err());
    }
}
