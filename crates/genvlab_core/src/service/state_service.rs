//! Registry state use-case service.
//!
//! # Responsibility
//! - Provide snapshot reads and the activation operation for remote callers.
//!
//! # Invariants
//! - Each call issues fresh registry queries; there is no cache and no
//!   consistency guarantee across calls.

use crate::config::GenvConfig;
use crate::control::GenvCommand;
use crate::model::device::DeviceBinding;
use crate::model::environment::EnvironmentRecord;
use crate::model::identity::KernelId;
use crate::registry::device_registry::{DeviceRegistry, GenvDeviceRegistry};
use crate::registry::env_registry::{EnvironmentRegistry, GenvEnvironmentRegistry};
use crate::registry::RegistryResult;

/// Use-case wrapper over the environment and device registries.
#[derive(Debug, Clone)]
pub struct StateService<E, D> {
    envs: E,
    devices: D,
}

impl StateService<GenvEnvironmentRegistry<GenvCommand>, GenvDeviceRegistry<GenvCommand>> {
    pub fn from_config(config: &GenvConfig) -> Self {
        let runner = GenvCommand::from_config(config);
        Self::new(
            GenvEnvironmentRegistry::new(runner.clone(), config.uid),
            GenvDeviceRegistry::new(runner, config.device_lookup),
        )
    }
}

impl<E: EnvironmentRegistry, D: DeviceRegistry> StateService<E, D> {
    pub fn new(envs: E, devices: D) -> Self {
        Self { envs, devices }
    }

    /// Current device bindings snapshot.
    pub async fn devices(&self) -> RegistryResult<Vec<DeviceBinding>> {
        self.devices.list_bindings().await
    }

    /// Current environments snapshot.
    pub async fn environments(&self) -> RegistryResult<Vec<EnvironmentRecord>> {
        self.envs.list_environments().await
    }

    /// Environment bound to `kernel_id`, if any.
    pub async fn find(&self, kernel_id: &KernelId) -> RegistryResult<Option<String>> {
        self.envs.resolve_environment(kernel_id).await
    }

    /// Binds `kernel_id` to `eid` in the registry.
    pub async fn activate(&self, eid: &str, kernel_id: &KernelId) -> RegistryResult<()> {
        self.envs.activate(eid, kernel_id).await
    }
}
