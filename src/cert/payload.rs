//! Signed envelopes and their URL-fragment encoding.
//!
//! The fragment is the canonical JSON of the envelope, zlib-compressed at
//! level 9 and base64url-encoded without padding, so the whole certificate
//! fits in a QR code pointing at the offline verifier page.

use crate::cert::canonical::canonical_json;
use crate::error::{CertError, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};

/// Largest decompressed envelope accepted from a fragment.
pub const MAX_ENVELOPE_BYTES: u64 = 1024 * 1024;

/// A certificate with its detached signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Certificate JSON as signed.
    pub cert: Value,
    /// Base64 signature over the canonical certificate.
    pub sig: String,
}

impl Envelope {
    /// Parses envelope JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CertError::MalformedEnvelope`] if `cert` or `sig` is
    /// missing or of the wrong type.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CertError::MalformedEnvelope(e.to_string()))?;
        Self::from_value(value)
    }

    /// Builds an envelope from parsed JSON.
    ///
    /// # Errors
    ///
    /// Same as [`Envelope::from_json`].
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(CertError::MalformedEnvelope("expected a JSON object".to_string()).into());
        };
        let cert = map
            .remove("cert")
            .ok_or_else(|| CertError::MalformedEnvelope("missing cert".to_string()))?;
        let sig = match map.remove("sig") {
            Some(Value::String(sig)) => sig,
            _ => return Err(CertError::MalformedEnvelope("missing sig".to_string()).into()),
        };
        Ok(Self { cert, sig })
    }

    /// Envelope as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({"cert": self.cert, "sig": self.sig})
    }
}

/// Encodes an envelope as a URL fragment.
///
/// # Errors
///
/// Returns [`CertError::Encoding`] if compression fails.
pub fn encode_fragment(envelope: &Envelope) -> Result<String> {
    let raw = canonical_json(&envelope.to_value());
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(9));
    encoder
        .write_all(&raw)
        .map_err(|e| CertError::Encoding(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CertError::Encoding(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decodes a URL fragment into an envelope. Padding is optional.
///
/// # Errors
///
/// Returns [`CertError::Encoding`] for bad base64, zlib or JSON, or when the
/// payload inflates past [`MAX_ENVELOPE_BYTES`], and
/// [`CertError::MalformedEnvelope`] for JSON of the wrong shape.
pub fn decode_fragment(fragment: &str) -> Result<Envelope> {
    let trimmed = fragment.trim().trim_end_matches('=');
    let compressed = URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| CertError::Encoding(format!("base64: {e}")))?;
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .take(MAX_ENVELOPE_BYTES + 1)
        .read_to_end(&mut raw)
        .map_err(|e| CertError::Encoding(format!("zlib: {e}")))?;
    if raw.len() as u64 > MAX_ENVELOPE_BYTES {
        return Err(CertError::Encoding(format!("payload exceeds {MAX_ENVELOPE_BYTES} bytes")).into());
    }
    let value: Value =
        serde_json::from_slice(&raw).map_err(|e| CertError::Encoding(format!("json: {e}")))?;
    Envelope::from_value(value)
}

/// Verifier URL for a fragment: `<base>/#<fragment>`.
///
/// # Examples
///
/// ```
/// use nullwipe::cert::payload::verifier_url;
///
/// assert_eq!(verifier_url("https://example.org/verify/", "abc"), "https://example.org/verify/#abc");
/// ```
#[must_use]
pub fn verifier_url(base: &str, fragment: &str) -> String {
    format!("{}/#{fragment}", base.trim_end_matches('/'))
}

/// Extracts the fragment from a verifier URL, or returns a bare fragment.
#[must_use]
pub fn extract_fragment(input: &str) -> &str {
    let input = input.trim();
    input.rsplit_once('#').map_or(input, |(_, fragment)| fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> Envelope {
        Envelope {
            cert: json!({
                "uuid": "3f1c",
                "MediaInformation": {"Model": "Cruzer Blade", "SerialNumber": "4C53"},
                "SanitizationDetails": {"MethodType": "Clear", "NumberOfPasses": "1"}
            }),
            sig: "c2lnbmF0dXJl".to_string(),
        }
    }

    #[test]
    fn test_fragment_decodes_to_same_envelope() {
        let env = envelope();
        let fragment = encode_fragment(&env).unwrap();
        assert!(!fragment.contains('='));
        assert!(!fragment.contains('+'));
        assert!(!fragment.contains('/'));
        assert_eq!(decode_fragment(&fragment).unwrap(), env);
    }

    #[test]
    fn test_decode_accepts_padding() {
        let env = envelope();
        let mut fragment = encode_fragment(&env).unwrap();
        while fragment.len() % 4 != 0 {
            fragment.push('=');
        }
        assert_eq!(decode_fragment(&fragment).unwrap(), env);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode_fragment("!!!").is_err());
        assert!(decode_fragment(&URL_SAFE_NO_PAD.encode(b"not zlib")).is_err());
    }

    #[test]
    fn test_decode_rejects_oversized_payload() {
        let len = usize::try_from(MAX_ENVELOPE_BYTES).unwrap() * 4;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(9));
        encoder.write_all(&vec![b' '; len]).unwrap();
        let fragment = URL_SAFE_NO_PAD.encode(encoder.finish().unwrap());
        assert!(fragment.len() < 16 * 1024);

        let err = decode_fragment(&fragment).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_extract_fragment() {
        assert_eq!(extract_fragment("https://x.github.io/Verifier_site/#eJyr"), "eJyr");
        assert_eq!(extract_fragment("  eJyr \n"), "eJyr");
    }

    #[test]
    fn test_envelope_shape_errors() {
        assert!(Envelope::from_json(r#"{"cert":{}}"#).is_err());
        assert!(Envelope::from_json(r#"{"sig":"x"}"#).is_err());
        assert!(Envelope::from_json(r#"{"cert":{},"sig":5}"#).is_err());
        assert!(Envelope::from_json("[]").is_err());
        assert!(Envelope::from_json(r#"{"cert":{"a":1},"sig":"x"}"#).is_ok());
    }
}
