//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::config::Settings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// nullwipe: NIST SP 800-88 storage sanitization.
///
/// Wipes drives and Android devices, issues signed wipe certificates and
/// keeps a tamper-evident audit chain of every run.
#[derive(Parser, Debug)]
#[command(name = "nullwipe")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the nullwipe database file.
    ///
    /// Defaults to `nullwipe.db` in the configured data directory.
    #[arg(short, long, env = "NULLWIPE_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML configuration file.
    #[arg(short, long, env = "NULLWIPE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the nullwipe database.
    ///
    /// Creates the database file and schema if they don't exist.
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Show run, certificate and audit totals.
    Status,

    /// Reset stored state (delete all runs, certificates and audit entries).
    Reset {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List block devices with their kind and applicable methods.
    Devices,

    /// List wipe methods.
    Methods {
        /// Only show methods applicable to this device kind
        /// (ata, nvme, usb, android, unknown).
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Wipe one or more devices or image files.
    ///
    /// Several targets are wiped in parallel. Each run is stored, certified
    /// and appended to the audit chain.
    Wipe {
        /// Device paths or image files.
        #[arg(required = true, num_args = 1..)]
        targets: Vec<String>,

        /// Wipe method (auto, zero, random, shred, quick, android).
        #[arg(short, long)]
        method: Option<String>,

        /// Verification mode (none, sampled, full).
        #[arg(long, default_value = "sampled")]
        verify: String,

        /// Operator identity recorded in certificates and attestation.
        #[arg(short, long)]
        operator: Option<String>,

        /// Confirm the destructive operation.
        #[arg(short = 'y', long)]
        yes: bool,

        /// Show the plan without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Skip the zero-trust attestation.
        #[arg(long)]
        no_attest: bool,

        /// Overwrite passes for shred and for the ATA fallback.
        #[arg(long)]
        passes: Option<u32>,

        /// Override the detected device kind.
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Wipe the attached Android device through adb and fastboot.
    AndroidWipe {
        /// Operator identity recorded in certificates and attestation.
        #[arg(short, long)]
        operator: Option<String>,

        /// Confirm the destructive operation.
        #[arg(short = 'y', long)]
        yes: bool,

        /// Reboot the device after the wipe.
        #[arg(long)]
        reboot: bool,

        /// Skip the zero-trust attestation.
        #[arg(long)]
        no_attest: bool,
    },

    /// Generate the certificate signing key pair.
    Keygen {
        /// Overwrite an existing key pair.
        #[arg(short, long)]
        force: bool,
    },

    /// Sign an existing certificate JSON file.
    Certify {
        /// Path to the certificate JSON.
        json: PathBuf,

        /// Do not publish the envelope even if upload is configured.
        #[arg(long)]
        no_upload: bool,

        /// Subtitle printed under the certificate title.
        #[arg(long)]
        subtitle: Option<String>,
    },

    /// Verify a certificate envelope.
    ///
    /// Accepts an envelope file, a verifier URL or a bare URL fragment.
    Verify {
        /// Envelope file, verifier URL or fragment.
        input: String,

        /// Public key to verify with (defaults to the configured key).
        #[arg(long)]
        public_key: Option<PathBuf>,
    },

    /// Stored certificates.
    #[command(subcommand)]
    Certs(CertCommands),

    /// Attestation and the audit chain.
    #[command(subcommand)]
    Audit(AuditCommands),
}

/// Certificate subcommands.
#[derive(Subcommand, Debug)]
pub enum CertCommands {
    /// List stored certificates.
    #[command(alias = "ls")]
    List,

    /// Show a stored certificate.
    Show {
        /// Certificate UUID.
        uuid: String,
    },
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
pub enum AuditCommands {
    /// Run the zero-trust attestation for a device without wiping.
    Attest {
        /// Device identifier or path.
        device_id: String,

        /// Operator identity.
        #[arg(short, long)]
        operator: Option<String>,

        /// Device kind used for the policy check.
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// List audit chain entries.
    Log,

    /// Print the current Merkle root.
    Root {
        /// Compute the root over an exported hash list instead.
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Recompute every entry and check the stored roots.
    Verify,

    /// Export the audit hashes, one per line.
    Export {
        /// Output file (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Returns the database path, falling back to the data directory in
    /// `settings`.
    #[must_use]
    pub fn get_db_path(&self, settings: &Settings) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| settings.db_path())
    }
}
