//! Sanitization strategies and the engine that drives them.
//!
//! Each method is a [`Wiper`]:
//!
//! - **Overwrite**: native zero, random and shred passes (Clear)
//! - **ATA**: `hdparm` Secure Erase with random-overwrite fallback (Purge)
//! - **NVMe**: Sanitize followed by a user-data-erase format (Purge)
//! - **USB**: quick wipe and FAT32 reformat (Clear)
//! - **Android**: fastboot userdata erase (Clear)
//!
//! [`WipeEngine`] runs one job end to end; [`parallel::run_many`] runs one
//! job per device on a thread pool.

pub mod android;
pub mod ata;
pub mod engine;
pub mod log;
pub mod nvme;
pub mod overwrite;
pub mod parallel;
pub mod pattern;
pub mod traits;
pub mod usb;

pub use android::AndroidWiper;
pub use ata::AtaSecureEraseWiper;
pub use engine::{WipeEngine, WipePlan, WipeReport, WipeRequest};
pub use log::WipeLog;
pub use nvme::NvmeSanitizeWiper;
pub use overwrite::{OverwritePlan, OverwriteWiper};
pub use parallel::run_many;
pub use pattern::Pattern;
pub use traits::{CancelToken, WipeContext, WipeOutcome, Wiper};
pub use usb::UsbQuickWiper;

use crate::core::device::DeviceKind;
use crate::core::method::WipeMethod;
use crate::error::{Result, WipeError};

/// Creates the wiper for `method` on a device of `kind`.
///
/// `Auto` resolves to ATA Secure Erase or NVMe Sanitize by interface.
///
/// # Errors
///
/// Returns [`WipeError::Unsupported`] when `Auto` is requested for a device
/// without a hardware erase command set.
pub fn create_wiper(method: WipeMethod, kind: DeviceKind, reboot: bool) -> Result<Box<dyn Wiper>> {
    match (method, kind) {
        (WipeMethod::Auto, DeviceKind::Ata) => Ok(Box::new(AtaSecureEraseWiper)),
        (WipeMethod::Auto, DeviceKind::Nvme) => Ok(Box::new(NvmeSanitizeWiper)),
        (WipeMethod::Auto, _) => Err(WipeError::Unsupported {
            method: method.to_string(),
            kind: kind.to_string(),
        }
        .into()),
        (WipeMethod::Quick, _) => Ok(Box::new(UsbQuickWiper)),
        (WipeMethod::Android, _) => Ok(Box::new(AndroidWiper { reboot })),
        (WipeMethod::Zero | WipeMethod::Random | WipeMethod::Shred, _) => {
            Ok(Box::new(OverwriteWiper::new(method)?))
        }
    }
}

/// Lists method identifiers.
#[must_use]
pub fn available_methods() -> Vec<&'static str> {
    WipeMethod::ALL.iter().map(|m| m.as_str()).collect()
}
