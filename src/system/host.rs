//! Host identity and process inspection.

use crate::core::device::SystemMetadata;
use sysinfo::{ProcessesToUpdate, System};

/// Environment variable naming the operator.
pub const OPERATOR_ENV: &str = "NULLWIPE_OPERATOR";

/// Resolves the operator: explicit value, then `NULLWIPE_OPERATOR`, then `USER`.
#[must_use]
pub fn resolve_operator(explicit: Option<&str>) -> String {
    explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .or_else(|| std::env::var(OPERATOR_ENV).ok().filter(|s| !s.trim().is_empty()))
        .or_else(|| std::env::var("USER").ok().filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Collects host metadata for certificates.
#[must_use]
pub fn collect_system_metadata(operator: &str) -> SystemMetadata {
    SystemMetadata {
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        os: System::long_os_version()
            .or_else(System::name)
            .unwrap_or_else(|| std::env::consts::OS.to_string()),
        kernel: System::kernel_version().unwrap_or_default(),
        operator: operator.to_string(),
    }
}

/// Source of running process names.
pub trait ProcessSource: Send + Sync {
    /// Names of all running processes.
    fn process_names(&self) -> Vec<String>;
}

/// Reads the live process table.
#[derive(Debug, Default)]
pub struct SysinfoProcesses;

impl ProcessSource for SysinfoProcesses {
    fn process_names(&self) -> Vec<String> {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        sys.processes()
            .values()
            .map(|p| p.name().to_string_lossy().into_owned())
            .collect()
    }
}

/// Fixed process list.
#[derive(Debug, Clone, Default)]
pub struct StaticProcesses(pub Vec<String>);

impl StaticProcesses {
    /// Creates a list from string slices.
    #[must_use]
    pub fn of(names: &[&str]) -> Self {
        Self(names.iter().map(ToString::to_string).collect())
    }
}

impl ProcessSource for StaticProcesses {
    fn process_names(&self) -> Vec<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_operator_wins() {
        assert_eq!(resolve_operator(Some("  alice ")), "alice");
    }

    #[test]
    fn test_blank_operator_falls_through() {
        assert!(!resolve_operator(Some("   ")).is_empty());
    }

    #[test]
    fn test_system_metadata_carries_operator() {
        let meta = collect_system_metadata("bob");
        assert_eq!(meta.operator, "bob");
        assert!(!meta.hostname.is_empty());
        assert!(!meta.os.is_empty());
    }

    #[test]
    fn test_live_process_table_not_empty() {
        assert!(!SysinfoProcesses.process_names().is_empty());
    }

    #[test]
    fn test_static_processes() {
        let source = StaticProcesses::of(&["bash", "gdb"]);
        assert_eq!(source.process_names(), vec!["bash", "gdb"]);
    }
}
