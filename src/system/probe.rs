//! Block device discovery and classification.
//!
//! Discovery parses `lsblk -J` output. Older util-linux releases encode
//! numbers and booleans as strings, so every field is read leniently.

use crate::core::device::{Device, DeviceKind, DeviceMetadata, basename, human_capacity};
use crate::error::{DeviceError, Result};
use crate::system::runner::CommandRunner;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

const LSBLK_DISK_COLUMNS: &str = "NAME,PATH,SIZE,MODEL,SERIAL,TRAN,RM,TYPE";

/// A partition of a block device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Partition node, e.g. `/dev/sdb1`.
    pub path: String,
    /// Mount point, if mounted.
    pub mountpoint: Option<String>,
}

/// Lists whole-disk block devices, skipping loop, optical and zram nodes.
///
/// # Errors
///
/// Returns an error if `lsblk` is missing, fails, or prints invalid JSON.
pub fn list_block_devices(runner: &dyn CommandRunner) -> Result<Vec<Device>> {
    let out = runner.run(
        "lsblk",
        &["-J", "-b", "-d", "-o", LSBLK_DISK_COLUMNS],
        PROBE_TIMEOUT,
    )?;
    if !out.success() {
        return Err(DeviceError::Probe(format!("lsblk exited with {}: {}", out.code, out.stderr.trim())).into());
    }
    parse_lsblk_disks(&out.stdout)
}

/// Parses `lsblk -J -b -d` output into devices.
///
/// # Errors
///
/// Returns [`DeviceError::Probe`] if the text is not the expected JSON shape.
pub fn parse_lsblk_disks(json: &str) -> Result<Vec<Device>> {
    let entries = block_devices(json)?;
    let mut devices = Vec::new();
    for entry in &entries {
        let name = str_field(entry, "name").unwrap_or_default();
        let kind_column = str_field(entry, "type").unwrap_or_default();
        if kind_column != "disk" || is_virtual(&name) {
            continue;
        }
        let path = str_field(entry, "path").unwrap_or_else(|| format!("/dev/{name}"));
        let transport = str_field(entry, "tran").map(|t| t.to_lowercase());
        let kind = kind_from_name(&name)
            .or_else(|| transport.as_deref().and_then(kind_from_transport))
            .unwrap_or_else(|| kind_from_heuristic(&name));
        devices.push(Device {
            path,
            size_bytes: entry.get("size").map_or(0, lenient_u64),
            model: str_field(entry, "model"),
            serial: str_field(entry, "serial"),
            transport,
            removable: entry.get("rm").is_some_and(lenient_bool),
            kind,
        });
    }
    Ok(devices)
}

/// Classifies a device.
///
/// Order: `nvme*` name, lsblk transport, `smartctl -i` text, `sd*` name.
pub fn detect_kind(runner: &dyn CommandRunner, path: &str) -> DeviceKind {
    let name = basename(path);
    if let Some(kind) = kind_from_name(&name) {
        return kind;
    }

    if let Ok(out) = runner.run("lsblk", &["-ndo", "TRAN", path], PROBE_TIMEOUT)
        && out.success()
        && let Some(kind) = kind_from_transport(out.stdout.trim())
    {
        return kind;
    }

    if runner.exists("smartctl")
        && let Ok(out) = runner.run("smartctl", &["-i", path], PROBE_TIMEOUT)
        && let Some(kind) = kind_from_smartctl(&out.stdout)
    {
        return kind;
    }

    kind_from_heuristic(&name)
}

/// Probes a single path into a [`Device`].
///
/// Falls back to a bare device when lsblk knows nothing about the path
/// (for example, a disk image file).
pub fn probe_device(runner: &dyn CommandRunner, path: &str) -> Device {
    let from_lsblk = runner
        .run(
            "lsblk",
            &["-J", "-b", "-d", "-o", LSBLK_DISK_COLUMNS, path],
            PROBE_TIMEOUT,
        )
        .ok()
        .filter(super::runner::CommandOutput::success)
        .and_then(|out| parse_lsblk_disks(&out.stdout).ok())
        .and_then(|mut devices| devices.pop());

    let mut device = from_lsblk.unwrap_or_else(|| Device::new(path, DeviceKind::Unknown));
    device.path = path.to_string();
    device.kind = detect_kind(runner, path);
    device
}

/// Collects certificate metadata for a device.
pub fn collect_device_metadata(runner: &dyn CommandRunner, device: &Device) -> DeviceMetadata {
    let mut meta = DeviceMetadata::from_device(device);

    if runner.exists("smartctl")
        && let Ok(out) = runner.run("smartctl", &["-i", &device.path], PROBE_TIMEOUT)
    {
        let info = parse_smartctl_info(&out.stdout);
        if let Some(model) = info.model {
            meta.model = model;
        }
        if let Some(serial) = info.serial {
            meta.serial = serial;
        }
        if let Some(firmware) = info.firmware {
            meta.firmware = firmware;
        }
    }

    if meta.capacity_bytes == 0
        && let Ok(out) = runner.run("blockdev", &["--getsize64", &device.path], PROBE_TIMEOUT)
        && let Ok(size) = out.stdout.trim().parse::<u64>()
    {
        meta.capacity_bytes = size;
        meta.capacity_human = human_capacity(size);
    }
    meta
}

/// Identity fields from `smartctl -i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmartInfo {
    /// `Model Number` (NVMe) or `Device Model` (ATA).
    pub model: Option<String>,
    /// `Serial Number`.
    pub serial: Option<String>,
    /// `Firmware Version`.
    pub firmware: Option<String>,
}

/// Extracts identity fields from `smartctl -i` output.
#[must_use]
pub fn parse_smartctl_info(text: &str) -> SmartInfo {
    let field = |pattern: &str| -> Option<String> {
        Regex::new(pattern)
            .ok()?
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    };
    SmartInfo {
        model: field(r"(?m)^(?:Model Number|Device Model|Product):\s*(.+)$"),
        serial: field(r"(?mi)^Serial Number:\s*(.+)$"),
        firmware: field(r"(?m)^(?:Firmware Version|Revision):\s*(.+)$"),
    }
}

/// Lists partitions of `path` with their mount points.
///
/// # Errors
///
/// Returns an error if `lsblk` cannot be run or its output is invalid.
pub fn list_partitions(runner: &dyn CommandRunner, path: &str) -> Result<Vec<Partition>> {
    let out = runner.run(
        "lsblk",
        &["-J", "-o", "NAME,PATH,TYPE,MOUNTPOINT", path],
        PROBE_TIMEOUT,
    )?;
    if !out.success() {
        return Ok(Vec::new());
    }
    parse_lsblk_partitions(&out.stdout)
}

/// Parses partition entries from `lsblk -J` tree output.
///
/// # Errors
///
/// Returns [`DeviceError::Probe`] if the text is not the expected JSON shape.
pub fn parse_lsblk_partitions(json: &str) -> Result<Vec<Partition>> {
    let mut partitions = Vec::new();
    for entry in &block_devices(json)? {
        collect_partitions(entry, &mut partitions);
    }
    Ok(partitions)
}

fn collect_partitions(entry: &Value, out: &mut Vec<Partition>) {
    let Some(children) = entry.get("children").and_then(Value::as_array) else {
        return;
    };
    for child in children {
        let name = str_field(child, "name").unwrap_or_default();
        if str_field(child, "type").as_deref() == Some("part") {
            out.push(Partition {
                path: str_field(child, "path").unwrap_or_else(|| format!("/dev/{name}")),
                mountpoint: str_field(child, "mountpoint"),
            });
        }
        collect_partitions(child, out);
    }
}

fn block_devices(json: &str) -> Result<Vec<Value>> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| DeviceError::Probe(format!("invalid lsblk output: {e}")))?;
    match root.get("blockdevices") {
        Some(Value::Array(entries)) => Ok(entries.clone()),
        _ => Err(DeviceError::Probe("lsblk output has no blockdevices".to_string()).into()),
    }
}

fn str_field(entry: &Value, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn lenient_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_u64() == Some(1),
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}

fn is_virtual(name: &str) -> bool {
    ["loop", "sr", "zram", "ram"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn kind_from_name(name: &str) -> Option<DeviceKind> {
    name.starts_with("nvme").then_some(DeviceKind::Nvme)
}

fn kind_from_transport(tran: &str) -> Option<DeviceKind> {
    match tran.trim().to_lowercase().as_str() {
        "nvme" => Some(DeviceKind::Nvme),
        "usb" => Some(DeviceKind::Usb),
        "sata" | "ata" => Some(DeviceKind::Ata),
        _ => None,
    }
}

fn kind_from_smartctl(info: &str) -> Option<DeviceKind> {
    if info.contains("NVMe") {
        Some(DeviceKind::Nvme)
    } else if info.contains("USB") {
        Some(DeviceKind::Usb)
    } else if info.contains("ATA") {
        Some(DeviceKind::Ata)
    } else {
        None
    }
}

fn kind_from_heuristic(name: &str) -> DeviceKind {
    if name.starts_with("sd") {
        DeviceKind::Ata
    } else {
        DeviceKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::testing::ScriptedRunner;

    const MODERN: &str = r#"{"blockdevices": [
        {"name":"sda","path":"/dev/sda","size":500107862016,"model":"Samsung SSD 860","serial":"S3Z9NB0K","tran":"sata","rm":false,"type":"disk"},
        {"name":"nvme0n1","path":"/dev/nvme0n1","size":1024209543168,"model":"WD Blue SN570","serial":"22010A","tran":"nvme","rm":false,"type":"disk"},
        {"name":"sdb","path":"/dev/sdb","size":15376318464,"model":"Cruzer Blade","serial":null,"tran":"usb","rm":true,"type":"disk"},
        {"name":"loop0","path":"/dev/loop0","size":4096,"model":null,"serial":null,"tran":null,"rm":false,"type":"loop"},
        {"name":"sr0","path":"/dev/sr0","size":1073741312,"model":"DVD","serial":null,"tran":"sata","rm":true,"type":"rom"}
    ]}"#;

    const LEGACY: &str = r#"{"blockdevices": [
        {"name":"sdc","size":"8004304896","model":"Flash Disk ","serial":"","tran":"usb","rm":"1","type":"disk"}
    ]}"#;

    #[test]
    fn test_parse_modern_lsblk() {
        let devices = parse_lsblk_disks(MODERN).unwrap();
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].kind, DeviceKind::Ata);
        assert_eq!(devices[0].size_bytes, 500_107_862_016);
        assert_eq!(devices[1].kind, DeviceKind::Nvme);
        assert_eq!(devices[2].kind, DeviceKind::Usb);
        assert!(devices[2].removable);
        assert_eq!(devices[2].serial, None);
    }

    #[test]
    fn test_parse_legacy_lsblk() {
        let devices = parse_lsblk_disks(LEGACY).unwrap();
        assert_eq!(devices.len(), 1);
        let dev = &devices[0];
        assert_eq!(dev.path, "/dev/sdc");
        assert_eq!(dev.size_bytes, 8_004_304_896);
        assert_eq!(dev.model.as_deref(), Some("Flash Disk"));
        assert_eq!(dev.serial, None);
        assert!(dev.removable);
        assert_eq!(dev.kind, DeviceKind::Usb);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_lsblk_disks("not json").is_err());
        assert!(parse_lsblk_disks("{}").is_err());
    }

    #[test]
    fn test_detect_kind_by_name() {
        let runner = ScriptedRunner::new();
        assert_eq!(detect_kind(&runner, "/dev/nvme0n1"), DeviceKind::Nvme);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_detect_kind_by_transport() {
        let runner = ScriptedRunner::new().on_ok("lsblk -ndo TRAN /dev/sdb", "usb\n");
        assert_eq!(detect_kind(&runner, "/dev/sdb"), DeviceKind::Usb);
    }

    #[test]
    fn test_detect_kind_by_smartctl() {
        let runner = ScriptedRunner::new()
            .on_ok("lsblk -ndo TRAN", "\n")
            .on_ok("smartctl -i /dev/vdb", "=== START OF INFORMATION SECTION ===\nSATA Version is: SATA 3.2\n");
        assert_eq!(detect_kind(&runner, "/dev/vdb"), DeviceKind::Ata);
    }

    #[test]
    fn test_detect_kind_heuristic_and_unknown() {
        let runner = ScriptedRunner::new().without_tool("smartctl");
        assert_eq!(detect_kind(&runner, "/dev/sdx"), DeviceKind::Ata);
        assert_eq!(detect_kind(&runner, "/tmp/disk.img"), DeviceKind::Unknown);
    }

    #[test]
    fn test_parse_smartctl_nvme() {
        let text = "Model Number:                       WD Blue SN570 1TB\n\
                    Serial Number:                      22010A801234\n\
                    Firmware Version:                   234110WD\n";
        let info = parse_smartctl_info(text);
        assert_eq!(info.model.as_deref(), Some("WD Blue SN570 1TB"));
        assert_eq!(info.serial.as_deref(), Some("22010A801234"));
        assert_eq!(info.firmware.as_deref(), Some("234110WD"));
    }

    #[test]
    fn test_parse_smartctl_ata() {
        let text = "Device Model:     Samsung SSD 860 EVO 500GB\nSerial Number:    S3Z9NB0K\n";
        let info = parse_smartctl_info(text);
        assert_eq!(info.model.as_deref(), Some("Samsung SSD 860 EVO 500GB"));
        assert_eq!(info.firmware, None);
    }

    #[test]
    fn test_collect_metadata_uses_blockdev_fallback() {
        let runner = ScriptedRunner::new()
            .without_tool("smartctl")
            .on_ok("blockdev --getsize64", "2147483648\n");
        let device = Device::new("/dev/sdz", DeviceKind::Ata);
        let meta = collect_device_metadata(&runner, &device);
        assert_eq!(meta.capacity_bytes, 2_147_483_648);
        assert_eq!(meta.capacity_human, "2 GB");
        assert_eq!(meta.interface, "ATA");
    }

    #[test]
    fn test_parse_partitions() {
        let json = r#"{"blockdevices":[{"name":"sdb","path":"/dev/sdb","type":"disk","mountpoint":null,
            "children":[
                {"name":"sdb1","path":"/dev/sdb1","type":"part","mountpoint":"/media/usb"},
                {"name":"sdb2","type":"part","mountpoint":null}
            ]}]}"#;
        let parts = parse_lsblk_partitions(json).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].mountpoint.as_deref(), Some("/media/usb"));
        assert_eq!(parts[1].path, "/dev/sdb2");
        assert_eq!(parts[1].mountpoint, None);
    }

    #[test]
    fn test_probe_device_image_fallback() {
        let runner = ScriptedRunner::new()
            .without_tool("smartctl")
            .on("lsblk", crate::system::runner::CommandOutput::failed(32, "not a block device"));
        let device = probe_device(&runner, "/tmp/disk.img");
        assert_eq!(device.path, "/tmp/disk.img");
        assert_eq!(device.kind, DeviceKind::Unknown);
    }
}
