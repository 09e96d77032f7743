//! ATA Secure Erase through `hdparm` (NIST Purge).
//!
//! Drives without security erase support fall back to random overwrite
//! passes, which only reach Clear.

use crate::core::method::WipeMethod;
use crate::error::{Error, Result, WipeError};
use crate::system::runner::require_tools;
use crate::wipe::overwrite::{OverwritePlan, overwrite_outcome};
use crate::wipe::traits::{WipeContext, WipeOutcome, Wiper};
use regex::Regex;
use uuid::Uuid;

/// Security feature state parsed from `hdparm -I`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtaSecurity {
    /// Security feature set supported.
    pub supported: bool,
    /// Security is frozen until power cycle.
    pub frozen: bool,
    /// A user password is set.
    pub enabled: bool,
    /// Enhanced erase available.
    pub enhanced: bool,
    /// Estimated erase time in minutes.
    pub erase_minutes: Option<u32>,
}

/// Parses the `Security:` section of `hdparm -I` output.
///
/// Lines read `supported`, `not<TAB>frozen`, and so on; a state counts only
/// when it is not negated. Output without a security section falls back to
/// a whole-text scan.
#[must_use]
pub fn parse_hdparm_security(info: &str) -> AtaSecurity {
    let section = security_section(info);
    let lines: Vec<&str> = section.as_deref().map_or_else(|| info.lines().collect(), |s| s.lines().collect());

    let flag = |word: &str| {
        lines.iter().any(|line| {
            let tokens: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
            tokens.iter().any(|t| t == word) && !tokens.iter().any(|t| t == "not")
        })
    };

    let lower = info.to_lowercase();
    let supported = if section.is_some() {
        lines.iter().any(|line| line.trim() == "supported")
    } else {
        lower.contains("supported") && lower.contains("security erase")
    };

    let enhanced = lines.iter().any(|line| {
        let l = line.to_lowercase();
        l.contains("supported: enhanced erase") && !l.split_whitespace().any(|t| t == "not")
    });

    let erase_minutes = Regex::new(r"(\d+)min for SECURITY ERASE UNIT")
        .ok()
        .and_then(|re| re.captures(info))
        .and_then(|c| c[1].parse().ok());

    AtaSecurity {
        supported,
        frozen: flag("frozen"),
        enabled: flag("enabled"),
        enhanced,
        erase_minutes,
    }
}

fn security_section(info: &str) -> Option<String> {
    let mut out = None::<String>;
    for line in info.lines() {
        if let Some(buf) = out.as_mut() {
            if !line.is_empty() && !line.starts_with(char::is_whitespace) {
                break;
            }
            buf.push_str(line);
            buf.push('\n');
        } else if line.trim_start().starts_with("Security:") && !line.starts_with(char::is_whitespace) {
            out = Some(String::new());
        }
    }
    out
}

/// ATA Secure Erase wiper.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtaSecureEraseWiper;

impl AtaSecureEraseWiper {
    fn erase(ctx: &mut WipeContext<'_>, device: &str) -> Result<WipeOutcome> {
        let password = format!("NullWipe{}", &Uuid::new_v4().simple().to_string()[..8]);

        ctx.log.line(&format!("Setting temporary security password {password}..."));
        let set = ctx.runner.run(
            "hdparm",
            &["--user-master", "u", "--security-set-pass", &password, device],
            ctx.command_timeout(),
        );
        match set {
            Ok(out) if out.success() => ctx.log.raw(&out.combined()),
            Ok(out) => {
                ctx.log.raw(&out.combined());
                ctx.log.line("Failed to set security password.");
                return Ok(WipeOutcome::failed(WipeMethod::Auto, "security_set_fail"));
            }
            Err(e) => {
                ctx.log.line(&format!("Failed to set security password: {e}"));
                return Ok(WipeOutcome::failed(WipeMethod::Auto, "security_set_fail"));
            }
        }

        if ctx.cancel.is_cancelled() {
            ctx.log.line("Cancelled before erase; clearing security password.");
            Self::disable_password(ctx, device, &password);
            return Err(WipeError::Cancelled.into());
        }

        ctx.log.line("Issuing secure erase...");
        let erase = ctx.runner.run(
            "hdparm",
            &["--user-master", "u", "--security-erase", &password, device],
            ctx.erase_timeout(),
        );
        let ok = match erase {
            Ok(out) => {
                ctx.log.raw(&out.combined());
                if !out.success() {
                    ctx.log.line(&format!("Secure erase failed, code={}", out.code));
                }
                out.success()
            }
            Err(e) => {
                ctx.log.line(&format!("Secure erase failed: {e}"));
                false
            }
        };

        if ok {
            ctx.log.line("Secure erase completed successfully.");
            tracing::info!(device = %device, "ATA secure erase complete");
            return Ok(WipeOutcome::purged(WipeMethod::Auto, "secure_erase_ok"));
        }

        Self::disable_password(ctx, device, &password);
        Ok(WipeOutcome::failed(WipeMethod::Auto, "secure_erase_failed"))
    }

    /// Leaves the drive unlocked when the erase did not clear the password.
    fn disable_password(ctx: &mut WipeContext<'_>, device: &str, password: &str) {
        let disabled = ctx.runner.run(
            "hdparm",
            &["--user-master", "u", "--security-disable", password, device],
            ctx.command_timeout(),
        );
        match disabled {
            Ok(out) if out.success() => ctx.log.line("Security password cleared."),
            Ok(out) => {
                ctx.log.raw(&out.combined());
                ctx.log.line(&format!("Could not clear security password {password}."));
                tracing::warn!(device = %device, "security password still set");
            }
            Err(e) => {
                ctx.log.line(&format!("Could not clear security password {password}: {e}"));
                tracing::warn!(device = %device, error = %e, "security password still set");
            }
        }
    }
}

impl Wiper for AtaSecureEraseWiper {
    fn wipe(&self, ctx: &mut WipeContext<'_>) -> Result<WipeOutcome> {
        let device = ctx.device.path.clone();
        ctx.log.line(&format!("Starting ATA secure erase on {device}"));

        if let Err(e) = require_tools(ctx.runner, &["hdparm"]) {
            ctx.log.line(&format!("{e}"));
            return Ok(WipeOutcome::failed(WipeMethod::Auto, "hdparm_missing"));
        }

        let info = match ctx.runner.run("hdparm", &["-I", &device], ctx.command_timeout()) {
            Ok(out) if out.success() && !out.stdout.trim().is_empty() => out.stdout,
            Ok(_) | Err(Error::Wipe(_) | Error::Device(_) | Error::Command(_)) => {
                ctx.log.line("Failed to run hdparm -I");
                return Ok(WipeOutcome::failed(WipeMethod::Auto, "hdparm_info_fail"));
            }
            Err(e) => return Err(e),
        };
        ctx.log.raw(&info);

        let security = parse_hdparm_security(&info);
        tracing::debug!(?security, device = %device, "ATA security state");

        if security.frozen {
            ctx.log.line("Device is frozen. Suspend/resume or power cycle required.");
            return Ok(WipeOutcome::failed(WipeMethod::Auto, "frozen"));
        }

        if security.supported {
            ctx.log.line("Secure erase supported.");
            if let Some(minutes) = security.erase_minutes {
                ctx.log.line(&format!("Drive estimates {minutes} minutes for erase."));
            }
            return Self::erase(ctx, &device);
        }

        ctx.log.line("Secure erase not supported. Falling back to multi-pass random overwrite.");
        let plan = OverwritePlan::random(ctx.settings.wipe.fallback_passes, &ctx.settings.wipe);
        overwrite_outcome(ctx, &plan, WipeMethod::Random, "random_overwrite")
    }

    fn method(&self) -> WipeMethod {
        WipeMethod::Auto
    }

    fn name(&self) -> &'static str {
        "ata-secure-erase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::device::{Device, DeviceKind};
    use crate::system::runner::{CommandOutput, CommandRunner};
    use crate::system::testing::ScriptedRunner;
    use crate::wipe::log::WipeLog;
    use crate::wipe::traits::CancelToken;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Cancels the shared token as soon as a command matching `trigger` runs.
    struct CancelOn {
        inner: ScriptedRunner,
        trigger: &'static str,
        token: CancelToken,
    }

    impl CommandRunner for CancelOn {
        fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
            let out = self.inner.run(program, args, timeout);
            if args.contains(&self.trigger) {
                self.token.cancel();
            }
            out
        }

        fn exists(&self, program: &str) -> bool {
            self.inner.exists(program)
        }
    }

    const NOT_FROZEN: &str = "\
ATA device, with non-removable media
\tModel Number:       Samsung SSD 860 EVO 500GB
Commands/features:
\tEnabled\tSupported:
\t   *\tSMART feature set
Security:
\tMaster password revision code = 65534
\t\tsupported
\tnot\tenabled
\tnot\tlocked
\tnot\tfrozen
\tnot\texpired: security count
\t\tsupported: enhanced erase
\t2min for SECURITY ERASE UNIT. 8min for ENHANCED SECURITY ERASE UNIT.
Logical Unit WWN Device Identifier: 5002538e40a1b2c3
";

    #[test]
    fn test_parse_not_frozen() {
        let sec = parse_hdparm_security(NOT_FROZEN);
        assert!(sec.supported);
        assert!(!sec.frozen);
        assert!(!sec.enabled);
        assert!(sec.enhanced);
        assert_eq!(sec.erase_minutes, Some(2));
    }

    #[test]
    fn test_parse_frozen() {
        let info = NOT_FROZEN.replace("\tnot\tfrozen", "\t\tfrozen");
        let sec = parse_hdparm_security(&info);
        assert!(sec.frozen);
        assert!(sec.supported);
    }

    #[test]
    fn test_parse_unsupported() {
        let info = "ATA device\nSecurity: \n\tnot\tsupported\n\tnot\tfrozen\nChecksum: correct\n";
        let sec = parse_hdparm_security(info);
        assert!(!sec.supported);
        assert!(!sec.frozen);
    }

    #[test]
    fn test_parse_without_section() {
        let sec = parse_hdparm_security("security erase supported");
        assert!(sec.supported);
    }

    #[test]
    fn test_section_stops_at_next_heading() {
        let section = security_section(NOT_FROZEN).unwrap();
        assert!(section.contains("supported: enhanced erase"));
        assert!(!section.contains("WWN"));
    }

    #[test]
    fn test_cancel_after_set_pass_unlocks_drive() {
        let logs = TempDir::new().unwrap();
        let settings = Settings::default();
        let device = Device::new("/dev/sdz", DeviceKind::Ata);
        let token = CancelToken::new();
        let runner = CancelOn {
            inner: ScriptedRunner::new().on_ok("hdparm -I", NOT_FROZEN),
            trigger: "--security-set-pass",
            token: token.clone(),
        };
        let mut log = WipeLog::create(logs.path(), &device.path).unwrap();
        let log_path = log.path().unwrap().to_path_buf();

        let result = {
            let mut ctx = WipeContext {
                device: &device,
                settings: &settings,
                runner: &runner,
                cancel: &token,
                log: &mut log,
            };
            AtaSecureEraseWiper.wipe(&mut ctx)
        };
        assert!(matches!(result, Err(Error::Wipe(WipeError::Cancelled))));

        let calls = runner.inner.calls();
        let set = calls
            .iter()
            .find(|c| c.contains("--security-set-pass"))
            .unwrap();
        let password = set.split_whitespace().nth(4).unwrap();
        assert!(password.starts_with("NullWipe"));
        assert!(!runner.inner.called("hdparm --user-master u --security-erase"));
        assert_eq!(
            calls.last().unwrap(),
            &format!("hdparm --user-master u --security-disable {password} /dev/sdz")
        );

        let text = std::fs::read_to_string(log_path).unwrap();
        assert!(text.contains(password));
    }

    #[test]
    fn test_failed_erase_clears_password() {
        let settings = Settings::default();
        let device = Device::new("/dev/sdz", DeviceKind::Ata);
        let token = CancelToken::new();
        let runner = ScriptedRunner::new()
            .on_ok("hdparm -I", NOT_FROZEN)
            .on("hdparm --user-master u --security-erase", CommandOutput::failed(5, "I/O error"));
        let mut log = WipeLog::discard();
        let mut ctx = WipeContext {
            device: &device,
            settings: &settings,
            runner: &runner,
            cancel: &token,
            log: &mut log,
        };

        let outcome = AtaSecureEraseWiper.wipe(&mut ctx).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status, "secure_erase_failed");
        assert!(runner.called("hdparm --user-master u --security-disable NullWipe"));
    }
}
