//! Runtime configuration.
//!
//! Settings are read from a TOML file. Every section has defaults, so a
//! missing file or a partial one is valid. `${VAR}` references in the file are
//! replaced with environment values before parsing.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "NULLWIPE_CONFIG";

/// File name looked up under the user config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Checks a value against its constraints.
pub trait Validate {
    /// Returns an error describing the first invalid field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending field.
    fn validate(&self) -> Result<()>;
}

/// All settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Output and state locations.
    pub paths: PathSettings,
    /// Engine parameters.
    pub wipe: WipeSettings,
    /// Certificate content.
    pub certificate: CertificateSettings,
    /// Pre-wipe checks.
    pub attestation: AttestationSettings,
    /// Android flow.
    pub android: AndroidSettings,
    /// Envelope publishing.
    pub upload: UploadSettings,
}

/// Output and state locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Database and state directory.
    pub data_dir: PathBuf,
    /// Certificate output directory.
    pub cert_dir: PathBuf,
    /// Per-run log directory.
    pub log_dir: PathBuf,
    /// Signing key directory.
    pub key_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".nullwipe"),
            cert_dir: PathBuf::from(".nullwipe/certificates"),
            log_dir: PathBuf::from("/var/log/nullwipe"),
            key_dir: PathBuf::from(".nullwipe/keys"),
        }
    }
}

/// Engine parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WipeSettings {
    /// Bytes per write.
    pub block_size: usize,
    /// Random passes before the final zero pass of `shred`.
    pub shred_passes: u32,
    /// Random passes when ATA secure erase is unsupported.
    pub fallback_passes: u32,
    /// Extra attempts for a failed block write.
    pub write_retries: u32,
    /// Windows read by sampled verification.
    pub sample_count: usize,
    /// Bytes per verification window.
    pub sample_len: usize,
    /// Limit for short external commands.
    pub command_timeout_secs: u64,
    /// Limit for hardware erase commands.
    pub erase_timeout_secs: u64,
    /// NVMe `--sanact` value.
    pub nvme_sanitize_action: u8,
    /// Seconds between sanitize-log polls.
    pub sanitize_poll_secs: u64,
    /// Sanitize-log polls before giving up.
    pub sanitize_max_polls: u32,
    /// Polls for the new partition after repartitioning.
    pub partition_retries: u32,
}

impl Default for WipeSettings {
    fn default() -> Self {
        Self {
            block_size: 1024 * 1024,
            shred_passes: 3,
            fallback_passes: 3,
            write_retries: 2,
            sample_count: 16,
            sample_len: 4096,
            command_timeout_secs: 30,
            erase_timeout_secs: 4 * 60 * 60,
            nvme_sanitize_action: 2,
            sanitize_poll_secs: 5,
            sanitize_max_polls: 720,
            partition_retries: 20,
        }
    }
}

/// Certificate content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateSettings {
    /// Subtitle printed under the certificate title.
    pub issuer: String,
    /// Media classification before sanitization.
    pub classification: String,
    /// Whether data was backed up before the wipe.
    pub data_backed_up: String,
    /// Title of the person performing sanitization.
    pub title: String,
    /// Base URL of the offline verifier page.
    pub verifier_base_url: Option<String>,
}

impl Default for CertificateSettings {
    fn default() -> Self {
        Self {
            issuer: "Issued by NullBytes".to_string(),
            classification: "Confidential".to_string(),
            data_backed_up: "Yes".to_string(),
            title: "System Operator".to_string(),
            verifier_base_url: None,
        }
    }
}

/// Pre-wipe checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationSettings {
    /// Refuse to wipe when attestation fails.
    pub required: bool,
    /// Process names that indicate a forensic tool.
    pub forensic_tools: Vec<String>,
    /// Device kinds allowed by policy.
    pub approved_media: Vec<String>,
}

impl Default for AttestationSettings {
    fn default() -> Self {
        Self {
            required: true,
            forensic_tools: vec![
                "wireshark".to_string(),
                "gdb".to_string(),
                "volatility".to_string(),
            ],
            approved_media: vec!["ata".to_string(), "nvme".to_string(), "usb".to_string()],
        }
    }
}

/// Android flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidSettings {
    /// Seconds to wait for the handset to appear in fastboot.
    pub fastboot_wait_secs: u64,
}

impl Default for AndroidSettings {
    fn default() -> Self {
        Self {
            fastboot_wait_secs: 300,
        }
    }
}

/// Envelope publishing to a GitHub Pages verifier repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Repository owner.
    pub user: Option<String>,
    /// Repository name.
    pub repo: Option<String>,
    /// Target branch.
    pub branch: String,
    /// Environment variable holding the API token.
    pub token_env: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            user: None,
            repo: None,
            branch: "main".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, fails to parse, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text fails to parse or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        let settings: Self = toml::from_str(&processed)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolves and loads settings.
    ///
    /// An explicit path wins; otherwise the user config file is used if it
    /// exists; otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "loading config");
            return Self::from_file(path);
        }
        if let Some(path) = default_config_path()
            && path.is_file()
        {
            tracing::debug!(path = %path.display(), "loading user config");
            return Self::from_file(path);
        }
        Ok(Self::default())
    }

    /// Default database file inside the data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths.data_dir.join("nullwipe.db")
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_positive("wipe.block_size", self.wipe.block_size, 512)?;
        validate_positive("wipe.sample_len", self.wipe.sample_len, 1)?;
        validate_positive("wipe.sample_count", self.wipe.sample_count, 2)?;
        validate_positive("wipe.shred_passes", self.wipe.shred_passes as usize, 1)?;
        validate_positive("wipe.fallback_passes", self.wipe.fallback_passes as usize, 1)?;
        if self.wipe.sample_len > self.wipe.block_size {
            return Err(Error::Config {
                message: format!(
                    "wipe.sample_len ({}) must not exceed wipe.block_size ({})",
                    self.wipe.sample_len, self.wipe.block_size
                ),
            });
        }
        if !(1..=4).contains(&self.wipe.nvme_sanitize_action) {
            return Err(Error::Config {
                message: format!(
                    "wipe.nvme_sanitize_action must be 1-4, got {}",
                    self.wipe.nvme_sanitize_action
                ),
            });
        }
        if let Some(url) = &self.certificate.verifier_base_url {
            validate_url("certificate.verifier_base_url", url)?;
        }
        Ok(())
    }
}

/// User config file location, e.g. `~/.config/nullwipe/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nullwipe").join(CONFIG_FILE_NAME))
}

fn validate_positive(field: &str, value: usize, min: usize) -> Result<()> {
    if value < min {
        return Err(Error::Config {
            message: format!("{field} must be at least {min}, got {value}"),
        });
    }
    Ok(())
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" if parsed.has_host() => Ok(()),
            "http" | "https" => Err(Error::Config {
                message: format!("{field} has no host: {url}"),
            }),
            scheme => Err(Error::Config {
                message: format!("{field} has unsupported scheme '{scheme}': {url}"),
            }),
        },
        Err(e) => Err(Error::Config {
            message: format!("{field} is not a valid URL ({e}): {url}"),
        }),
    }
}

/// Replaces `${VAR}` with the variable's value. Unset variables are left as is.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| Error::Config {
        message: e.to_string(),
    })?;
    let result = re.replace_all(content, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        std::env::var(name).unwrap_or_else(|_| format!("${{{name}}}"))
    });
    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.wipe.block_size, 1024 * 1024);
        assert_eq!(settings.wipe.sample_count, 16);
        assert_eq!(settings.certificate.classification, "Confidential");
        assert_eq!(settings.android.fastboot_wait_secs, 300);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [wipe]
            shred_passes = 7

            [certificate]
            issuer = "Issued by Example Corp"
            "#,
        )
        .unwrap();
        assert_eq!(settings.wipe.shred_passes, 7);
        assert_eq!(settings.wipe.block_size, 1024 * 1024);
        assert_eq!(settings.certificate.issuer, "Issued by Example Corp");
        assert_eq!(settings.certificate.data_backed_up, "Yes");
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn test_rejects_sample_larger_than_block() {
        let err = Settings::from_toml_str(
            r"
            [wipe]
            block_size = 4096
            sample_len = 8192
            ",
        )
        .unwrap_err();
        assert!(err.to_string().contains("sample_len"));
    }

    #[test]
    fn test_rejects_zero_passes() {
        let err = Settings::from_toml_str("[wipe]\nshred_passes = 0\n").unwrap_err();
        assert!(err.to_string().contains("shred_passes"));
    }

    #[test]
    fn test_rejects_bad_verifier_url() {
        let err =
            Settings::from_toml_str("[certificate]\nverifier_base_url = \"ftp://x\"\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let ok = Settings::from_toml_str(
            "[certificate]\nverifier_base_url = \"https://verify.example.org\"\n",
        );
        assert!(ok.is_ok());
    }

    #[test_case("https://[::" ; "unclosed ipv6 host")]
    #[test_case("https://exa mple.org" ; "space in host")]
    #[test_case("https://" ; "empty host")]
    #[test_case("verify.example.org/page" ; "relative")]
    #[test_case("mailto:ops@example.org" ; "non web scheme")]
    fn test_rejects_unparsable_verifier_url(url: &str) {
        let toml = format!("[certificate]\nverifier_base_url = \"{url}\"\n");
        let err = Settings::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("certificate.verifier_base_url"));
    }

    #[test]
    fn test_rejects_bad_sanitize_action() {
        assert!(Settings::from_toml_str("[wipe]\nnvme_sanitize_action = 9\n").is_err());
    }

    #[test]
    fn test_unset_env_reference_is_kept() {
        let out = substitute_env_vars("token = \"${NULLWIPE_SURELY_UNSET_VAR}\"").unwrap();
        assert_eq!(out, "token = \"${NULLWIPE_SURELY_UNSET_VAR}\"");
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[android]\nfastboot_wait_secs = 10").unwrap();
        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.android.fastboot_wait_secs, 10);
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/nullwipe.toml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_db_path() {
        let settings = Settings::default();
        assert_eq!(settings.db_path(), PathBuf::from(".nullwipe/nullwipe.db"));
    }
}
