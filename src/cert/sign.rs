//! Ed25519 signing keys and detached signatures over canonical JSON.
//!
//! Keys are stored as PEM: `private.pem` (PKCS#8, owner read/write only) and
//! `public.pem` (SPKI). Signatures are standard base64.

use crate::cert::canonical::canonical_json;
use crate::error::{CertError, Error, IoError, Result};
use crate::io::{read_file, write_file};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Private key file name.
pub const PRIVATE_KEY_FILE: &str = "private.pem";

/// Public key file name.
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// Locations of a generated key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    /// PKCS#8 private key.
    pub private: PathBuf,
    /// SPKI public key.
    pub public: PathBuf,
}

impl KeyPaths {
    /// Key paths inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            private: dir.join(PRIVATE_KEY_FILE),
            public: dir.join(PUBLIC_KEY_FILE),
        }
    }
}

/// Generates a key pair in `dir`.
///
/// # Errors
///
/// Returns [`Error::InvalidState`] if a private key already exists and
/// `force` is false, or an I/O error if the files cannot be written.
pub fn generate_keypair(dir: &Path, force: bool) -> Result<KeyPaths> {
    let paths = KeyPaths::in_dir(dir);
    if paths.private.exists() && !force {
        return Err(Error::InvalidState {
            message: format!(
                "signing key already exists at {}. Use --force to replace it",
                paths.private.display()
            ),
        });
    }

    let key = SigningKey::from_bytes(&rand::random::<[u8; 32]>());
    let private_pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CertError::KeyInvalid(e.to_string()))?;
    let public_pem = key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CertError::KeyInvalid(e.to_string()))?;

    write_private_key(&paths.private, private_pem.as_bytes())?;
    write_file(&paths.public, public_pem.as_bytes())?;
    tracing::info!(dir = %dir.display(), "generated signing key pair");
    Ok(paths)
}

/// Creates `path` with mode 0600 before any key material is written.
fn write_private_key(path: &Path, pem: &[u8]) -> Result<()> {
    let failed = |e: std::io::Error| IoError::WriteFailed {
        path: path.to_string_lossy().to_string(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }
    // An existing file keeps its old mode when truncated.
    if path.exists() {
        std::fs::remove_file(path).map_err(failed)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .map_err(failed)?;
    file.write_all(pem).map_err(failed)?;
    Ok(())
}

/// Loads a PKCS#8 PEM private key.
///
/// # Errors
///
/// Returns [`CertError::KeyMissing`] or [`CertError::KeyInvalid`].
pub fn load_signing_key(path: &Path) -> Result<SigningKey> {
    let pem = read_key(path)?;
    SigningKey::from_pkcs8_pem(&pem).map_err(|e| CertError::KeyInvalid(e.to_string()).into())
}

/// Loads an SPKI PEM public key.
///
/// # Errors
///
/// Returns [`CertError::KeyMissing`] or [`CertError::KeyInvalid`].
pub fn load_verifying_key(path: &Path) -> Result<VerifyingKey> {
    let pem = read_key(path)?;
    VerifyingKey::from_public_key_pem(&pem).map_err(|e| CertError::KeyInvalid(e.to_string()).into())
}

fn read_key(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CertError::KeyMissing {
            path: path.display().to_string(),
        }
        .into());
    }
    read_file(path)
}

/// Signs the canonical JSON of `value`, returning base64.
#[must_use]
pub fn sign_value(key: &SigningKey, value: &Value) -> String {
    let signature = key.sign(&canonical_json(value));
    STANDARD.encode(signature.to_bytes())
}

/// Checks a base64 signature over the canonical JSON of `value`.
///
/// Malformed signatures count as invalid.
#[must_use]
pub fn verify_value(key: &VerifyingKey, value: &Value, signature_b64: &str) -> bool {
    let Ok(bytes) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(&canonical_json(value), &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_keygen_and_round_trip() {
        let dir = TempDir::new().unwrap();
        let paths = generate_keypair(dir.path(), false).unwrap();

        let mode = std::fs::metadata(&paths.private).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let key = load_signing_key(&paths.private).unwrap();
        let public = load_verifying_key(&paths.public).unwrap();
        let cert = json!({"uuid": "abc", "Status": "ok"});
        let sig = sign_value(&key, &cert);
        assert!(verify_value(&public, &cert, &sig));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(sign_value(&key, &a), sign_value(&key, &b));
    }

    #[test]
    fn test_tampered_value_fails() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let cert = json!({"MediaDestination": {"Option": "Destroy"}});
        let sig = sign_value(&key, &cert);
        let tampered = json!({"MediaDestination": {"Option": "Reuse"}});
        assert!(!verify_value(&key.verifying_key(), &tampered, &sig));
        assert!(!verify_value(&key.verifying_key(), &cert, "not base64!"));
        assert!(!verify_value(&key.verifying_key(), &cert, "AAAA"));
    }

    #[test]
    fn test_keygen_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        generate_keypair(dir.path(), false).unwrap();
        assert!(generate_keypair(dir.path(), false).is_err());
        assert!(generate_keypair(dir.path(), true).is_ok());
    }

    #[test]
    fn test_forced_keygen_replaces_loose_permissions() {
        let dir = TempDir::new().unwrap();
        let private = dir.path().join(PRIVATE_KEY_FILE);
        std::fs::write(&private, "old").unwrap();
        std::fs::set_permissions(&private, std::fs::Permissions::from_mode(0o644)).unwrap();

        let paths = generate_keypair(dir.path(), true).unwrap();
        let mode = std::fs::metadata(&paths.private).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(load_signing_key(&paths.private).is_ok());
    }

    #[test]
    fn test_keygen_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let paths = generate_keypair(&dir.path().join("keys/nested"), false).unwrap();
        assert!(paths.private.exists());
        assert!(paths.public.exists());
    }

    #[test]
    fn test_missing_key() {
        let dir = TempDir::new().unwrap();
        let err = load_signing_key(&dir.path().join("private.pem")).unwrap_err();
        assert!(matches!(err, Error::Certificate(CertError::KeyMissing { .. })));
    }
}
