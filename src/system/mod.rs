//! Host-facing plumbing: external commands, device probing, mounts and
//! host identity.

pub mod host;
pub mod mount;
pub mod probe;
pub mod runner;
pub mod testing;

pub use host::{ProcessSource, StaticProcesses, SysinfoProcesses, collect_system_metadata, resolve_operator};
pub use probe::{collect_device_metadata, detect_kind, list_block_devices, probe_device};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
