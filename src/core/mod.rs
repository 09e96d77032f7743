//! Core domain models for nullwipe.
//!
//! Devices, sanitization methods, and the wipe job state machine. These are
//! pure domain models with no I/O dependencies.

pub mod device;
pub mod job;
pub mod method;

pub use device::{Device, DeviceKind, DeviceMetadata, SystemMetadata};
pub use job::{JobState, WipeJob};
pub use method::{NistCategory, VerifyMode, WipeMethod, default_method, methods_for};
