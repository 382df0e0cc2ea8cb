//! Core logic for genvlab.
//! Resolves kernel launches to GPU environments through the `genv` registry
//! and exposes registry state to API callers.

pub mod config;
pub mod control;
pub mod logging;
pub mod model;
pub mod registry;
pub mod service;

pub use config::{ConfigError, GenvConfig};
pub use control::{CommandRunner, ControlError, ControlResult, GenvCommand};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::device::DeviceBinding;
pub use model::environment::EnvironmentRecord;
pub use model::identity::{validate_identifier, IdentifierError, KernelId};
pub use model::overlay::{EnvironmentOverlay, DEFAULT_DEVICE_VARIABLE};
pub use registry::device_registry::{DeviceLookupVerb, DeviceRegistry, GenvDeviceRegistry};
pub use registry::env_registry::{EnvironmentRegistry, GenvEnvironmentRegistry};
pub use registry::{RegistryError, RegistryResult};
pub use service::provisioner::{
    AssignmentSource, DeviceAssignment, DeviceOverride, DeviceOverrideProvider, KernelProvisioner,
    LaunchEnvironmentPreparer, NoOverride, ProvisionError, ProvisionResult, StaticOverride,
};
pub use service::state_service::StateService;

/// Registry-backed state service using the `genv` executable.
pub type GenvStateService =
    StateService<GenvEnvironmentRegistry<GenvCommand>, GenvDeviceRegistry<GenvCommand>>;

/// Registry-backed provisioner using the `genv` executable.
pub type GenvProvisioner =
    KernelProvisioner<GenvEnvironmentRegistry<GenvCommand>, GenvDeviceRegistry<GenvCommand>>;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
