//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::audit::attest::Attestor;
use crate::audit::chain::{AppendedEntry, AuditChain, import_hashes};
use crate::audit::merkle::compute_merkle_root;
use crate::audit::record::AuditRecord;
use crate::cert::issue::{IssueOptions, IssuedCertificate, Issuer};
use crate::cert::sign::{KeyPaths, generate_keypair, load_verifying_key};
use crate::cert::verifier::{load_envelope, verify_envelope};
use crate::cli::output::{
    DeviceRow, MethodRow, OutputFormat, RunResult, format_attestation, format_audit_log,
    format_certificate, format_certificates, format_chain_status, format_devices, format_issued,
    format_keygen, format_methods, format_plans, format_root, format_run_results, format_status,
    format_verify,
};
use crate::cli::parser::{AuditCommands, CertCommands, Cli, Commands};
use crate::config::Settings;
use crate::core::device::DeviceKind;
use crate::core::method::{VerifyMode, WipeMethod, methods_for};
use crate::error::{CertError, CommandError, Result, StorageError};
use crate::io::read_file;
use crate::storage::{SqliteStorage, Storage, StoredCertificate};
use crate::system::host::{ProcessSource, SysinfoProcesses, resolve_operator};
use crate::system::probe::{detect_kind, list_block_devices};
use crate::system::runner::{CommandRunner, ProcessRunner};
use crate::wipe::android::ANDROID_DEVICE;
use crate::wipe::engine::{WipeEngine, WipeReport, WipeRequest};
use crate::wipe::parallel::run_many;
use crate::wipe::traits::CancelToken;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Host services the commands talk to.
pub struct Host {
    /// Runner for external tools.
    pub runner: Arc<dyn CommandRunner>,
    /// Source of running process names for attestation.
    pub processes: fn() -> Box<dyn ProcessSource>,
    /// Shared by every wipe started from this host.
    pub cancel: CancelToken,
}

impl Host {
    /// The real machine.
    #[must_use]
    pub fn system() -> Self {
        Self {
            runner: Arc::new(ProcessRunner),
            processes: || Box::new(SysinfoProcesses),
            cancel: CancelToken::new(),
        }
    }

    /// Cancels running wipes on the first Ctrl-C and exits on the second.
    ///
    /// Cancelled runs still get a certificate and an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::ExecutionFailed`] if a handler is already
    /// installed or the signal cannot be hooked.
    pub fn cancel_on_interrupt(&self) -> Result<()> {
        let cancel = self.cancel.clone();
        ctrlc::set_handler(move || {
            if cancel.is_cancelled() {
                std::process::exit(130);
            }
            tracing::warn!("interrupt received, stopping wipes at the next block");
            cancel.cancel();
        })
        .map_err(|e| CommandError::ExecutionFailed(format!("cannot install interrupt handler: {e}")).into())
    }
}

/// Arguments of `wipe` and `android-wipe`.
struct WipeArgs<'a> {
    targets: &'a [String],
    method: Option<&'a str>,
    verify: &'a str,
    operator: Option<&'a str>,
    kind: Option<&'a str>,
    yes: bool,
    dry_run: bool,
    attest: bool,
    passes: Option<u32>,
    reboot: bool,
}

/// Executes the CLI command against the real machine.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    execute_with(cli, &Host::system())
}

/// Executes the CLI command with the given host services.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute_with(cli: &Cli, host: &Host) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let settings = Settings::load(cli.config.as_deref())?;
    let db_path = cli.get_db_path(&settings);

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force, format),
        Commands::Status => cmd_status(&db_path, format),
        Commands::Reset { yes } => cmd_reset(&db_path, *yes, format),
        Commands::Devices => cmd_devices(host, format),
        Commands::Methods { kind } => cmd_methods(kind.as_deref(), format),
        Commands::Wipe {
            targets,
            method,
            verify,
            operator,
            yes,
            dry_run,
            no_attest,
            passes,
            kind,
        } => cmd_wipe(
            settings,
            &db_path,
            host,
            &WipeArgs {
                targets,
                method: method.as_deref(),
                verify,
                operator: operator.as_deref(),
                kind: kind.as_deref(),
                yes: *yes,
                dry_run: *dry_run,
                attest: !*no_attest,
                passes: *passes,
                reboot: false,
            },
            format,
        ),
        Commands::AndroidWipe {
            operator,
            yes,
            reboot,
            no_attest,
        } => {
            let targets = [ANDROID_DEVICE.to_string()];
            cmd_wipe(
                settings,
                &db_path,
                host,
                &WipeArgs {
                    targets: &targets,
                    method: Some(WipeMethod::Android.as_str()),
                    verify: VerifyMode::None.as_str(),
                    operator: operator.as_deref(),
                    kind: Some(DeviceKind::Android.as_str()),
                    yes: *yes,
                    dry_run: false,
                    attest: !*no_attest,
                    passes: None,
                    reboot: *reboot,
                },
                format,
            )
        }
        Commands::Keygen { force } => cmd_keygen(&settings, *force, format),
        Commands::Certify {
            json,
            no_upload,
            subtitle,
        } => cmd_certify(
            settings,
            &db_path,
            json,
            &IssueOptions {
                subtitle: subtitle.clone(),
                upload: !*no_upload,
            },
            format,
        ),
        Commands::Verify { input, public_key } => {
            cmd_verify(&settings, input, public_key.as_deref(), format)
        }
        Commands::Certs(cmd) => match cmd {
            CertCommands::List => cmd_certs_list(&db_path, format),
            CertCommands::Show { uuid } => cmd_certs_show(&db_path, uuid, format),
        },
        Commands::Audit(cmd) => match cmd {
            AuditCommands::Attest {
                device_id,
                operator,
                kind,
            } => cmd_audit_attest(
                &settings,
                host,
                device_id,
                operator.as_deref(),
                kind.as_deref(),
                format,
            ),
            AuditCommands::Log => cmd_audit_log(&db_path, format),
            AuditCommands::Root { from } => cmd_audit_root(&db_path, from.as_deref(), format),
            AuditCommands::Verify => cmd_audit_verify(&db_path, format),
            AuditCommands::Export { output } => cmd_audit_export(&db_path, output.as_deref()),
        },
    }
}

fn open_storage(db_path: &Path) -> Result<SqliteStorage> {
    if !db_path.exists() {
        return Err(StorageError::NotInitialized.into());
    }
    let storage = SqliteStorage::open(db_path)?;

    if !storage.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }

    Ok(storage)
}

fn confirm(yes: bool, action: &str) -> Result<()> {
    if yes {
        Ok(())
    } else {
        Err(CommandError::ExecutionFailed(format!(
            "Use --yes to confirm {action}. This destroys data irreversibly."
        ))
        .into())
    }
}

fn parse_method(s: &str) -> Result<WipeMethod> {
    WipeMethod::parse(s).ok_or_else(|| {
        let names: Vec<&str> = WipeMethod::ALL.iter().map(|m| m.as_str()).collect();
        CommandError::InvalidArgument(format!(
            "unknown method '{s}' (expected one of: {})",
            names.join(", ")
        ))
        .into()
    })
}

fn parse_verify(s: &str) -> Result<VerifyMode> {
    VerifyMode::parse(s).ok_or_else(|| {
        CommandError::InvalidArgument(format!(
            "unknown verification mode '{s}' (expected none, sampled or full)"
        ))
        .into()
    })
}

fn parse_kind(s: &str) -> Result<DeviceKind> {
    DeviceKind::parse(s).ok_or_else(|| {
        CommandError::InvalidArgument(format!(
            "unknown device kind '{s}' (expected ata, nvme, usb, android or unknown)"
        ))
        .into()
    })
}

fn cmd_init(db_path: &Path, force: bool, _format: OutputFormat) -> Result<String> {
    if db_path.exists() && !force && SqliteStorage::open(db_path)?.is_initialized()? {
        return Err(CommandError::ExecutionFailed(
            "Database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to create directory: {e}"))
        })?;
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }

    let mut storage = SqliteStorage::open(db_path)?;
    storage.init()?;

    Ok(format!(
        "Initialized nullwipe database at: {}\n",
        db_path.display()
    ))
}

fn cmd_status(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let stats = storage.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_reset(db_path: &Path, yes: bool, _format: OutputFormat) -> Result<String> {
    if !yes {
        return Err(CommandError::ExecutionFailed(
            "Use --yes to confirm reset. This will delete all runs, certificates and audit entries."
                .to_string(),
        )
        .into());
    }

    let mut storage = open_storage(db_path)?;
    storage.reset()?;

    Ok("nullwipe state reset successfully.\n".to_string())
}

fn cmd_devices(host: &Host, format: OutputFormat) -> Result<String> {
    let rows: Vec<DeviceRow> = list_block_devices(host.runner.as_ref())?
        .into_iter()
        .map(|device| DeviceRow {
            methods: methods_for(device.kind).to_vec(),
            device,
        })
        .collect();
    Ok(format_devices(&rows, format))
}

fn cmd_methods(kind: Option<&str>, format: OutputFormat) -> Result<String> {
    let methods: Vec<WipeMethod> = match kind {
        Some(k) => methods_for(parse_kind(k)?).to_vec(),
        None => WipeMethod::ALL.to_vec(),
    };
    let rows: Vec<MethodRow> = methods
        .into_iter()
        .map(|method| MethodRow {
            method,
            label: method.label(),
            category: method.category(),
            description: method.description(),
        })
        .collect();
    Ok(format_methods(&rows, format))
}

fn cmd_wipe(
    mut settings: Settings,
    db_path: &Path,
    host: &Host,
    args: &WipeArgs<'_>,
    format: OutputFormat,
) -> Result<String> {
    if args.targets.is_empty() {
        return Err(CommandError::MissingArgument("target".to_string()).into());
    }
    let method = args.method.map(parse_method).transpose()?;
    let verify = parse_verify(args.verify)?;
    let kind = args.kind.map(parse_kind).transpose()?;
    if let Some(passes) = args.passes {
        if passes == 0 {
            return Err(CommandError::InvalidArgument("--passes must be at least 1".to_string()).into());
        }
        settings.wipe.shred_passes = passes;
        settings.wipe.fallback_passes = passes;
    }

    let operator = resolve_operator(args.operator);
    let requests: Vec<WipeRequest> = args
        .targets
        .iter()
        .map(|target| {
            let mut request = WipeRequest::new(target.clone(), operator.clone()).with_verify(verify);
            if let Some(m) = method {
                request = request.with_method(m);
            }
            if let Some(k) = kind {
                request = request.with_kind(k);
            }
            request.reboot = args.reboot;
            request
        })
        .collect();

    if args.dry_run {
        let engine = WipeEngine::new(settings, Arc::clone(&host.runner));
        let plans = requests
            .iter()
            .map(|r| engine.plan(r))
            .collect::<Result<Vec<_>>>()?;
        return Ok(format_plans(&plans, format));
    }

    confirm(args.yes, "the wipe")?;
    let mut storage = open_storage(db_path)?;
    let engine = build_engine(settings, host, args.attest)?;

    let outcomes = if let [request] = requests.as_slice() {
        vec![Ok(engine.run(request)?)]
    } else {
        run_many(&engine, &requests)?
    };

    let mut results = Vec::with_capacity(outcomes.len());
    for (request, outcome) in requests.iter().zip(outcomes) {
        let result = match outcome {
            Ok(report) => {
                let audit = persist_report(&mut storage, &report)?;
                RunResult {
                    target: request.target.clone(),
                    report: Some(report),
                    audit: Some(audit),
                    error: None,
                }
            }
            Err(e) => RunResult {
                target: request.target.clone(),
                report: None,
                audit: None,
                error: Some(e.to_string()),
            },
        };
        results.push(result);
    }
    Ok(format_run_results(&results, format))
}

fn build_engine(settings: Settings, host: &Host, attest: bool) -> Result<WipeEngine> {
    let issuer = Issuer::from_settings(settings.clone())?;
    let attestation = settings.attestation.clone();
    let mut engine = WipeEngine::new(settings, Arc::clone(&host.runner))
        .with_issuer(issuer)
        .with_cancel(host.cancel.clone());
    if attest {
        engine = engine.with_attestor(Attestor::new((host.processes)(), attestation));
    } else {
        tracing::warn!("attestation skipped by operator");
    }
    Ok(engine)
}

/// Stores the run, its certificate and a new audit chain entry.
fn persist_report(storage: &mut SqliteStorage, report: &WipeReport) -> Result<AppendedEntry> {
    storage.add_run(report)?;

    let certificate = match &report.certificate {
        Some(issued) => {
            let value = read_issued(issued)?;
            storage.add_certificate(&StoredCertificate::from_issued(
                issued,
                value.clone(),
                Some(report.job.id.to_string()),
            ))?;
            Some(value)
        }
        None => None,
    };

    let record = AuditRecord::from_report(report, certificate.as_ref());
    AuditChain::new(storage).append(&record)
}

fn read_issued(issued: &IssuedCertificate) -> Result<Value> {
    let text = read_file(&issued.json_path)?;
    serde_json::from_str(&text).map_err(|e| StorageError::Serialization(e.to_string()).into())
}

fn cmd_keygen(settings: &Settings, force: bool, format: OutputFormat) -> Result<String> {
    let paths = generate_keypair(&settings.paths.key_dir, force)?;
    Ok(format_keygen(&paths, format))
}

fn cmd_certify(
    settings: Settings,
    db_path: &Path,
    json: &Path,
    options: &IssueOptions,
    format: OutputFormat,
) -> Result<String> {
    let text = read_file(json)?;
    let value: Value = serde_json::from_str(&text).map_err(|e| {
        CommandError::InvalidArgument(format!("{}: invalid JSON: {e}", json.display()))
    })?;
    if !value.is_object() {
        return Err(CommandError::InvalidArgument(format!(
            "{}: certificate must be a JSON object",
            json.display()
        ))
        .into());
    }

    let issuer = Issuer::from_settings(settings)?;
    let issued = issuer.issue_value(&value, options)?;

    match open_storage(db_path) {
        Ok(mut storage) => {
            storage.add_certificate(&StoredCertificate::from_issued(&issued, value, None))?;
        }
        Err(e) => tracing::debug!(error = %e, "certificate not recorded in database"),
    }
    Ok(format_issued(&issued, format))
}

fn cmd_verify(
    settings: &Settings,
    input: &str,
    public_key: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let key_path = public_key.map_or_else(
        || KeyPaths::in_dir(&settings.paths.key_dir).public,
        Path::to_path_buf,
    );
    let key = load_verifying_key(&key_path)?;
    let envelope = load_envelope(input)?;
    let outcome = verify_envelope(&key, &envelope);
    if !outcome.valid {
        return Err(CertError::SignatureInvalid.into());
    }
    Ok(format_verify(&outcome, format))
}

fn cmd_certs_list(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let certs = storage.list_certificates()?;
    Ok(format_certificates(&certs, format))
}

fn cmd_certs_show(db_path: &Path, uuid: &str, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let cert = storage
        .get_certificate(uuid)?
        .ok_or_else(|| CertError::NotFound {
            uuid: uuid.to_string(),
        })?;
    Ok(format_certificate(&cert, format))
}

fn cmd_audit_attest(
    settings: &Settings,
    host: &Host,
    device_id: &str,
    operator: Option<&str>,
    kind: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    let kind = match kind {
        Some(k) => parse_kind(k)?,
        None if Path::new(device_id).exists() => detect_kind(host.runner.as_ref(), device_id),
        None => DeviceKind::Unknown,
    };
    let attestor = Attestor::new((host.processes)(), settings.attestation.clone());
    let result = attestor.attest(device_id, kind, &resolve_operator(operator))?;
    result.enforce()?;
    Ok(format_attestation(&result, format))
}

fn cmd_audit_log(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let entries = storage.list_audit_entries()?;
    Ok(format_audit_log(&entries, format))
}

fn cmd_audit_root(db_path: &Path, from: Option<&Path>, format: OutputFormat) -> Result<String> {
    let hashes = match from {
        Some(path) => import_hashes(&read_file(path)?),
        None => {
            let mut storage = open_storage(db_path)?;
            let hashes = AuditChain::new(&mut storage).hashes()?;
            hashes
        }
    };
    Ok(format_root(&compute_merkle_root(&hashes), hashes.len(), format))
}

fn cmd_audit_verify(db_path: &Path, format: OutputFormat) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let status = AuditChain::new(&mut storage).verify()?;
    Ok(format_chain_status(&status, format))
}

fn cmd_audit_export(db_path: &Path, output: Option<&Path>) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let chain = AuditChain::new(&mut storage);
    match output {
        Some(path) => {
            let count = chain.export(path)?;
            Ok(format!("Exported {count} audit hashes to {}\n", path.display()))
        }
        None => chain.export_text(),
    }
}
