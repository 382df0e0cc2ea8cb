//! Registry snapshot records and launch-time value types.
//!
//! # Responsibility
//! - Define the records parsed from registry output.
//! - Define the identity and overlay types used at kernel launch.
//!
//! # Invariants
//! - Records are observations of registry state; this crate never owns them.
//! - `DeviceBinding::eid == None` means the device is unbound.

pub mod device;
pub mod environment;
pub mod identity;
pub mod overlay;
