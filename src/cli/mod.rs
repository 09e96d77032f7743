//! CLI layer for nullwipe.
//!
//! Provides the command-line interface using clap, with commands for
//! wiping devices, issuing and verifying certificates, and inspecting the
//! audit chain.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{Host, execute, execute_with};
pub use output::OutputFormat;
pub use parser::{AuditCommands, CertCommands, Cli, Commands};
