//! Sanitization methods and their NIST SP 800-88 categories.

use crate::core::device::DeviceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sanitization method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WipeMethod {
    /// Hardware erase chosen by interface: ATA Secure Erase or NVMe Sanitize.
    Auto,
    /// Single zero pass.
    Zero,
    /// Single random pass.
    Random,
    /// Random passes followed by a zero pass.
    Shred,
    /// USB signature removal, key-area zeroing and FAT32 reformat.
    Quick,
    /// Android userdata and cache erase through fastboot.
    Android,
}

/// NIST SP 800-88 sanitization category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NistCategory {
    /// Logical overwrite through the host interface.
    Clear,
    /// Device-level erase through firmware commands.
    Purge,
}

impl fmt::Display for NistCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear => f.write_str("Clear"),
            Self::Purge => f.write_str("Purge"),
        }
    }
}

impl WipeMethod {
    /// All methods in display order.
    pub const ALL: [Self; 6] = [
        Self::Auto,
        Self::Zero,
        Self::Random,
        Self::Shred,
        Self::Quick,
        Self::Android,
    ];

    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Zero => "zero",
            Self::Random => "random",
            Self::Shred => "shred",
            Self::Quick => "quick",
            Self::Android => "android",
        }
    }

    /// Parses an identifier, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Short label shown in method listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Auto => "Auto (Secure Erase/Sanitize) [Purge]",
            Self::Zero => "Zero Fill [Clear]",
            Self::Random => "Random Fill [Clear]",
            Self::Shred => "Shred+Zero [Clear]",
            Self::Quick => "Quick Wipe + FAT32 [Clear]",
            Self::Android => "Android Factory Erase [Clear]",
        }
    }

    /// Long description of what the method does.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Auto => {
                "Automatic secure wipe using hardware commands (ATA Secure Erase or NVMe Sanitize). NIST category: Purge."
            }
            Self::Zero => {
                "Overwrites all sectors with zeros. Simple clear operation. NIST category: Clear."
            }
            Self::Random => {
                "Overwrites all sectors with random data. Clear operation with stronger obfuscation. NIST category: Clear."
            }
            Self::Shred => {
                "Multiple overwrite passes (default 3) with random data followed by zero fill. NIST category: Clear."
            }
            Self::Quick => {
                "Quick wipe for USB drives. Removes filesystem signatures, zeroes key areas, recreates partition table, and formats as FAT32. NIST category: Clear."
            }
            Self::Android => {
                "Reboots the handset into fastboot and erases the userdata and cache partitions. Requires an unlocked bootloader. NIST category: Clear."
            }
        }
    }

    /// Category the method belongs to when it runs as requested.
    #[must_use]
    pub const fn category(self) -> NistCategory {
        match self {
            Self::Auto => NistCategory::Purge,
            _ => NistCategory::Clear,
        }
    }

    /// Whether the method needs a hardware command set rather than plain writes.
    #[must_use]
    pub const fn is_hardware(self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl fmt::Display for WipeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Methods applicable to a device kind. The first entry is the default.
///
/// # Examples
///
/// ```
/// use nullwipe::core::{DeviceKind, WipeMethod, methods_for};
///
/// assert_eq!(methods_for(DeviceKind::Usb)[0], WipeMethod::Quick);
/// assert!(!methods_for(DeviceKind::Unknown).contains(&WipeMethod::Auto));
/// ```
#[must_use]
pub fn methods_for(kind: DeviceKind) -> &'static [WipeMethod] {
    match kind {
        DeviceKind::Ata | DeviceKind::Nvme => &[
            WipeMethod::Auto,
            WipeMethod::Zero,
            WipeMethod::Random,
            WipeMethod::Shred,
        ],
        DeviceKind::Usb => &[
            WipeMethod::Quick,
            WipeMethod::Zero,
            WipeMethod::Random,
            WipeMethod::Shred,
        ],
        DeviceKind::Android => &[WipeMethod::Android],
        DeviceKind::Unknown => &[WipeMethod::Zero, WipeMethod::Random, WipeMethod::Shred],
    }
}

/// Default method for a device kind.
#[must_use]
pub fn default_method(kind: DeviceKind) -> WipeMethod {
    methods_for(kind)[0]
}

/// Post-wipe read-back verification depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// No read-back.
    None,
    /// Fixed number of sampled windows.
    #[default]
    Sampled,
    /// Every byte.
    Full,
}

impl VerifyMode {
    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sampled => "sampled",
            Self::Full => "full",
        }
    }

    /// Parses an identifier, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(Self::None),
            "sampled" | "sample" => Some(Self::Sampled),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    /// Verification modes offered for a device kind.
    #[must_use]
    pub fn options_for(kind: DeviceKind) -> &'static [Self] {
        if kind == DeviceKind::Android {
            &[Self::None]
        } else {
            &[Self::None, Self::Sampled, Self::Full]
        }
    }
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DeviceKind::Ata, WipeMethod::Auto)]
    #[test_case(DeviceKind::Nvme, WipeMethod::Auto)]
    #[test_case(DeviceKind::Usb, WipeMethod::Quick)]
    #[test_case(DeviceKind::Android, WipeMethod::Android)]
    #[test_case(DeviceKind::Unknown, WipeMethod::Zero)]
    fn test_default_method(kind: DeviceKind, expected: WipeMethod) {
        assert_eq!(default_method(kind), expected);
    }

    #[test]
    fn test_methods_for_usb_excludes_auto() {
        let methods = methods_for(DeviceKind::Usb);
        assert!(!methods.contains(&WipeMethod::Auto));
        assert_eq!(methods.len(), 4);
    }

    #[test]
    fn test_category() {
        assert_eq!(WipeMethod::Auto.category(), NistCategory::Purge);
        assert_eq!(WipeMethod::Shred.category(), NistCategory::Clear);
        assert_eq!(WipeMethod::Quick.category(), NistCategory::Clear);
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(WipeMethod::parse("SHRED"), Some(WipeMethod::Shred));
        assert_eq!(WipeMethod::parse("auto"), Some(WipeMethod::Auto));
        assert_eq!(WipeMethod::parse("gutmann"), None);
    }

    #[test]
    fn test_descriptions_name_category() {
        for method in WipeMethod::ALL {
            let desc = method.description();
            assert!(desc.contains(&method.category().to_string()), "{method}");
        }
    }

    #[test]
    fn test_verify_mode_options() {
        assert_eq!(VerifyMode::options_for(DeviceKind::Android), &[VerifyMode::None]);
        assert_eq!(VerifyMode::options_for(DeviceKind::Ata).len(), 3);
        assert_eq!(VerifyMode::parse("Full"), Some(VerifyMode::Full));
        assert_eq!(VerifyMode::default(), VerifyMode::Sampled);
    }
}
