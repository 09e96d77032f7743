//! Binary entry point for nullwipe.
//!
//! nullwipe: NIST SP 800-88 storage sanitization with signed certificates.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use nullwipe::cli::output::{OutputFormat, format_error};
use nullwipe::cli::{Cli, Host, execute_with};
use nullwipe::logging;
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format);
    logging::init(cli.verbose);

    let host = Host::system();
    if let Err(e) = host.cancel_on_interrupt() {
        tracing::warn!(error = %e, "Ctrl-C will not cancel wipes cleanly");
    }

    match execute_with(&cli, &host) {
        Ok(output) => {
            if !output.is_empty() {
                // Handle broken pipe gracefully (e.g., when piped to `head` or `jq`)
                if let Err(e) = write!(io::stdout(), "{output}")
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    eprintln!("Error writing to stdout: {e}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let error_output = format_error(&e, format);
            match format {
                OutputFormat::Json => {
                    // JSON errors go to stdout for programmatic parsing
                    println!("{error_output}");
                }
                OutputFormat::Text => {
                    eprintln!("Error: {error_output}");
                }
            }
            ExitCode::FAILURE
        }
    }
}
