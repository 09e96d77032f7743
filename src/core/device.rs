//! Storage device models.
//!
//! A [`Device`] is what probing finds; [`DeviceMetadata`] and
//! [`SystemMetadata`] are what a certificate records about the media and the
//! host that sanitized it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Interface class of a storage device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// SATA/PATA drive addressed through ATA commands.
    Ata,
    /// NVMe controller namespace.
    Nvme,
    /// USB mass storage.
    Usb,
    /// Android handset reached through adb/fastboot.
    Android,
    /// Anything probing could not classify.
    Unknown,
}

impl DeviceKind {
    /// Lowercase identifier used in config files and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ata => "ata",
            Self::Nvme => "nvme",
            Self::Usb => "usb",
            Self::Android => "android",
            Self::Unknown => "unknown",
        }
    }

    /// Parses an identifier, case-insensitively. `sata` is accepted for ATA.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ata" | "sata" => Some(Self::Ata),
            "nvme" => Some(Self::Nvme),
            "usb" => Some(Self::Usb),
            "android" => Some(Self::Android),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Whether the kind is wiped through a block device node.
    #[must_use]
    pub const fn is_block(self) -> bool {
        !matches!(self, Self::Android)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// A storage device discovered by probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device node, e.g. `/dev/sda`.
    pub path: String,

    /// Capacity in bytes (0 if unknown).
    pub size_bytes: u64,

    /// Model string reported by the kernel.
    pub model: Option<String>,

    /// Serial number reported by the kernel.
    pub serial: Option<String>,

    /// Transport (`sata`, `nvme`, `usb`, ...).
    pub transport: Option<String>,

    /// Whether the kernel flags the media as removable.
    pub removable: bool,

    /// Classified interface.
    pub kind: DeviceKind,
}

impl Device {
    /// Creates a device with only a path and kind.
    #[must_use]
    pub fn new(path: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            path: path.into(),
            size_bytes: 0,
            model: None,
            serial: None,
            transport: None,
            removable: false,
            kind,
        }
    }

    /// Last path component, e.g. `sda` for `/dev/sda`.
    #[must_use]
    pub fn basename(&self) -> String {
        basename(&self.path)
    }
}

/// Returns the final component of a device path.
///
/// # Examples
///
/// ```
/// use nullwipe::core::device::basename;
///
/// assert_eq!(basename("/dev/nvme0n1"), "nvme0n1");
/// assert_eq!(basename("android"), "android");
/// ```
#[must_use]
pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned())
}

/// Media details recorded in a certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    /// Device path or identifier.
    pub device: String,
    /// Manufacturer, when reported separately from the model.
    pub vendor: String,
    /// Model name.
    pub model: String,
    /// Serial number.
    pub serial: String,
    /// Firmware revision.
    pub firmware: String,
    /// Capacity in bytes.
    pub capacity_bytes: u64,
    /// Capacity as whole gigabytes, e.g. `"931 GB"`.
    pub capacity_human: String,
    /// Interface tag, e.g. `"NVME"`.
    pub interface: String,
}

impl DeviceMetadata {
    /// Builds metadata from a probed device.
    #[must_use]
    pub fn from_device(device: &Device) -> Self {
        Self {
            device: device.path.clone(),
            vendor: String::new(),
            model: device.model.clone().unwrap_or_default(),
            serial: device.serial.clone().unwrap_or_default(),
            firmware: String::new(),
            capacity_bytes: device.size_bytes,
            capacity_human: human_capacity(device.size_bytes),
            interface: device.kind.to_string(),
        }
    }
}

/// Formats a capacity in whole binary gigabytes.
///
/// # Examples
///
/// ```
/// use nullwipe::core::device::human_capacity;
///
/// assert_eq!(human_capacity(2 * 1024 * 1024 * 1024), "2 GB");
/// assert_eq!(human_capacity(0), "0 GB");
/// ```
#[must_use]
pub fn human_capacity(bytes: u64) -> String {
    format!("{} GB", bytes / (1024 * 1024 * 1024))
}

/// Host details recorded in a certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMetadata {
    /// Host name.
    pub hostname: String,
    /// Operating system description.
    pub os: String,
    /// Kernel version.
    pub kernel: String,
    /// Person performing the sanitization.
    pub operator: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("ata", Some(DeviceKind::Ata))]
    #[test_case("SATA", Some(DeviceKind::Ata))]
    #[test_case("nvme", Some(DeviceKind::Nvme))]
    #[test_case(" usb ", Some(DeviceKind::Usb))]
    #[test_case("android", Some(DeviceKind::Android))]
    #[test_case("floppy", None)]
    fn test_kind_parse(input: &str, expected: Option<DeviceKind>) {
        assert_eq!(DeviceKind::parse(input), expected);
    }

    #[test]
    fn test_kind_display_is_uppercase() {
        assert_eq!(DeviceKind::Nvme.to_string(), "NVME");
        assert_eq!(DeviceKind::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_kind_is_block() {
        assert!(DeviceKind::Ata.is_block());
        assert!(DeviceKind::Unknown.is_block());
        assert!(!DeviceKind::Android.is_block());
    }

    #[test]
    fn test_metadata_from_device() {
        let mut device = Device::new("/dev/sdb", DeviceKind::Usb);
        device.size_bytes = 16 * 1024 * 1024 * 1024;
        device.model = Some("Cruzer".to_string());

        let meta = DeviceMetadata::from_device(&device);
        assert_eq!(meta.device, "/dev/sdb");
        assert_eq!(meta.model, "Cruzer");
        assert_eq!(meta.serial, "");
        assert_eq!(meta.capacity_human, "16 GB");
        assert_eq!(meta.interface, "USB");
    }

    #[test]
    fn test_device_basename() {
        let device = Device::new("/dev/sda", DeviceKind::Ata);
        assert_eq!(device.basename(), "sda");
    }
}
