//! Certificate issuance: sign, encode, render and write the artifacts.

use crate::cert::payload::{Envelope, encode_fragment, verifier_url};
use crate::cert::record::Certificate;
use crate::cert::render::render_text;
use crate::cert::sign::{KeyPaths, load_signing_key, sign_value};
use crate::config::Settings;
use crate::core::device::basename;
use crate::error::{Result, StorageError};
use crate::io::{ensure_dir_with_fallback, write_file};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

/// Per-issue choices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueOptions {
    /// Subtitle under the title. Defaults to the configured issuer line.
    pub subtitle: Option<String>,
    /// Try to publish the envelope (needs the `upload` feature).
    pub upload: bool,
}

/// Files and links produced for one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCertificate {
    /// Certificate identifier.
    pub uuid: String,
    /// Device the certificate is about.
    pub device: String,
    /// Base64 signature.
    pub signature: String,
    /// Pretty certificate JSON.
    pub json_path: PathBuf,
    /// Signature file.
    pub signature_path: PathBuf,
    /// Envelope JSON.
    pub envelope_path: PathBuf,
    /// Text sheet.
    pub text_path: PathBuf,
    /// File holding the verifier URL.
    pub url_path: PathBuf,
    /// Verifier URL (or bare `#fragment` when no verifier is configured).
    pub verifier_url: String,
    /// Published envelope location, when upload succeeded.
    pub hosted_url: Option<String>,
}

/// Signs and writes certificates.
pub struct Issuer {
    key: SigningKey,
    settings: Settings,
}

impl Issuer {
    /// Creates an issuer with an explicit key.
    #[must_use]
    pub const fn new(key: SigningKey, settings: Settings) -> Self {
        Self { key, settings }
    }

    /// Creates an issuer with the key from the configured key directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key is missing or invalid.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let paths = KeyPaths::in_dir(&settings.paths.key_dir);
        let key = load_signing_key(&paths.private)?;
        Ok(Self::new(key, settings))
    }

    /// Issues a certificate built by the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be serialized or written.
    pub fn issue(&self, cert: &Certificate) -> Result<IssuedCertificate> {
        let value = serde_json::to_value(cert).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.issue_value(&value, &IssueOptions::default())
    }

    /// Issues a certificate from arbitrary JSON.
    ///
    /// The id is taken from `uuid` (generated if absent) and the device from
    /// `device` or `MediaInformation.Source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory or files cannot be written.
    pub fn issue_value(&self, cert: &Value, options: &IssueOptions) -> Result<IssuedCertificate> {
        let uuid = cert
            .get("uuid")
            .and_then(Value::as_str)
            .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
        let device = cert
            .get("device")
            .and_then(Value::as_str)
            .or_else(|| cert.pointer("/MediaInformation/Source").and_then(Value::as_str))
            .unwrap_or("certificate")
            .to_string();

        let signature = sign_value(&self.key, cert);
        let envelope = Envelope {
            cert: cert.clone(),
            sig: signature.clone(),
        };

        let hosted_url = if options.upload { self.publish(&envelope) } else { None };
        let fragment = match &hosted_url {
            Some(url) => url.clone(),
            None => encode_fragment(&envelope)?,
        };
        let verify_target = self
            .verifier_base()
            .map_or_else(|| format!("#{fragment}"), |base| verifier_url(&base, &fragment));

        let dir = ensure_dir_with_fallback(&self.settings.paths.cert_dir)?;
        let stem = format!("{uuid}_{}", basename(&device));
        let json_path = dir.join(format!("{stem}.json"));
        let signature_path = dir.join(format!("{stem}.sig.b64"));
        let envelope_path = dir.join(format!("{stem}.envelope.json"));
        let text_path = dir.join(format!("{stem}.txt"));
        let url_path = dir.join(format!("{stem}.url.txt"));

        let pretty = |v: &Value| {
            serde_json::to_string_pretty(v).map_err(|e| StorageError::Serialization(e.to_string()))
        };
        let subtitle = options
            .subtitle
            .clone()
            .unwrap_or_else(|| self.settings.certificate.issuer.clone());

        write_file(&json_path, pretty(cert)?)?;
        write_file(&signature_path, &signature)?;
        write_file(&envelope_path, pretty(&envelope.to_value())?)?;
        write_file(&text_path, render_text(cert, &subtitle, &verify_target))?;
        write_file(&url_path, &verify_target)?;

        tracing::info!(uuid = %uuid, path = %json_path.display(), "certificate issued");
        Ok(IssuedCertificate {
            uuid,
            device,
            signature,
            json_path,
            signature_path,
            envelope_path,
            text_path,
            url_path,
            verifier_url: verify_target,
            hosted_url,
        })
    }

    fn verifier_base(&self) -> Option<String> {
        self.settings.certificate.verifier_base_url.clone().or_else(|| {
            self.settings
                .upload
                .user
                .as_ref()
                .map(|user| format!("https://{user}.github.io/Verifier_site"))
        })
    }

    #[cfg(feature = "upload")]
    fn publish(&self, envelope: &Envelope) -> Option<String> {
        crate::cert::publish::upload_envelope(&self.settings.upload, envelope)
    }

    #[cfg(not(feature = "upload"))]
    fn publish(&self, _envelope: &Envelope) -> Option<String> {
        tracing::debug!(user = ?self.settings.upload.user, "built without upload support, using offline payload");
        None
    }
}
