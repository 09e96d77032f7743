//! External command execution.
//!
//! Every hardware-facing step (hdparm, nvme, parted, adb, ...) goes through
//! [`CommandRunner`], so the engine can be driven by a scripted runner in
//! tests and by [`ProcessRunner`] in production.

use crate::error::{CommandError, DeviceError, Error, Result, WipeError};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Exit code, -1 when terminated by a signal.
    pub code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: 0,
        }
    }

    /// Failed output with the given code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            code,
        }
    }

    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout followed by stderr, for log files.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Runs external programs.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, killing it after `timeout`.
    ///
    /// A non-zero exit is not an error; inspect [`CommandOutput::code`].
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::ToolMissing`] if the program cannot be found,
    /// [`WipeError::Timeout`] if it runs too long, or
    /// [`CommandError::ExecutionFailed`] if it cannot be spawned.
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput>;

    /// Whether `program` is available.
    fn exists(&self, program: &str) -> bool;

    /// Waits between polls.
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Runs real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        tracing::debug!(program, ?args, "running command");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(program, &e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_reader = thread::spawn(move || drain(stdout));
        let err_reader = thread::spawn(move || drain(stderr));

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(program, secs = timeout.as_secs(), "command timed out");
                return Err(WipeError::Timeout {
                    step: command_line(program, args),
                    secs: timeout.as_secs(),
                }
                .into());
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(CommandOutput {
            stdout: out_reader.join().unwrap_or_default(),
            stderr: err_reader.join().unwrap_or_default(),
            code: status.code().unwrap_or(-1),
        })
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

fn drain<R: Read>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn spawn_error(program: &str, err: &std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        DeviceError::ToolMissing {
            tool: program.to_string(),
        }
        .into()
    } else {
        CommandError::ExecutionFailed(format!("{program}: {err}")).into()
    }
}

/// Joins a program and its arguments for logs and error messages.
#[must_use]
pub fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

/// Fails with [`DeviceError::ToolMissing`] unless every tool is present.
///
/// # Errors
///
/// Returns an error naming the first missing tool.
pub fn require_tools(runner: &dyn CommandRunner, tools: &[&str]) -> Result<()> {
    for tool in tools {
        if !runner.exists(tool) {
            return Err(DeviceError::ToolMissing {
                tool: (*tool).to_string(),
            }
            .into());
        }
    }
    Ok(())
}
