//! Kernel provisioning service.
//!
//! # Responsibility
//! - Resolve a kernel id to an environment and then to device indices.
//! - Produce the environment overlay applied before the kernel process starts.
//!
//! # Invariants
//! - Override precedence: per-call override > override provider > registry.
//! - A kernel with no registry binding falls back to its own id as the eid.
//! - Any registry failure aborts provisioning; no overlay is produced and the
//!   launch must not proceed (fail closed, never "all devices visible").
//! - Nothing is cached; each launch attempt re-resolves.

use crate::config::GenvConfig;
use crate::control::GenvCommand;
use crate::model::identity::{IdentifierError, KernelId};
use crate::model::overlay::EnvironmentOverlay;
use crate::registry::device_registry::{DeviceRegistry, GenvDeviceRegistry};
use crate::registry::env_registry::{EnvironmentRegistry, GenvEnvironmentRegistry};
use crate::registry::RegistryError;
use log::{error, info};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Provisioning failure; the kernel launch must be aborted.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    InvalidKernelId(#[from] IdentifierError),
    #[error("failed to resolve devices for kernel `{kernel_id}`: {source}")]
    Registry {
        kernel_id: String,
        #[source]
        source: RegistryError,
    },
}

/// Explicit device list that bypasses registry resolution for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceOverride {
    indices: Vec<u32>,
}

impl DeviceOverride {
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

/// Supplies device overrides for kernels, consulted before the registry.
pub trait DeviceOverrideProvider: Send + Sync {
    fn device_override(&self, kernel_id: &KernelId) -> Option<DeviceOverride>;
}

/// Provider that never overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverride;

impl DeviceOverrideProvider for NoOverride {
    fn device_override(&self, _kernel_id: &KernelId) -> Option<DeviceOverride> {
        None
    }
}

/// Fixed overrides keyed by kernel id, with an optional catch-all.
#[derive(Debug, Clone, Default)]
pub struct StaticOverride {
    per_kernel: HashMap<KernelId, DeviceOverride>,
    fallback: Option<DeviceOverride>,
}

impl StaticOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kernel(mut self, kernel_id: KernelId, devices: DeviceOverride) -> Self {
        self.per_kernel.insert(kernel_id, devices);
        self
    }

    pub fn with_fallback(mut self, devices: DeviceOverride) -> Self {
        self.fallback = Some(devices);
        self
    }
}

impl DeviceOverrideProvider for StaticOverride {
    fn device_override(&self, kernel_id: &KernelId) -> Option<DeviceOverride> {
        self.per_kernel
            .get(kernel_id)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

/// How the device list of an assignment was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    /// Caller or override provider supplied the indices.
    Override,
    /// Registry reported the kernel's environment binding.
    Registry,
    /// No binding; the kernel id itself was used as the eid.
    KernelIdFallback,
}

/// Resolved devices for one kernel launch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceAssignment {
    pub kernel_id: KernelId,
    /// Environment used for device lookup; `None` for overrides.
    pub eid: Option<String>,
    pub source: AssignmentSource,
    pub indices: Vec<u32>,
}

/// Host-facing launch capability: returns the environment a kernel process
/// must be started with.
pub trait LaunchEnvironmentPreparer: Send + Sync {
    fn prepare_environment(
        &self,
        kernel_id: &str,
        base: &HashMap<String, String>,
    ) -> impl Future<Output = ProvisionResult<HashMap<String, String>>> + Send;
}

/// Orchestrates environment and device resolution for kernel launches.
#[derive(Debug, Clone)]
pub struct KernelProvisioner<E, D, P = NoOverride> {
    envs: E,
    devices: D,
    overrides: P,
    device_variable: String,
}

impl<E, D> KernelProvisioner<E, D, NoOverride>
where
    E: EnvironmentRegistry,
    D: DeviceRegistry,
{
    pub fn new(envs: E, devices: D, device_variable: impl Into<String>) -> Self {
        Self {
            envs,
            devices,
            overrides: NoOverride,
            device_variable: device_variable.into(),
        }
    }
}

impl KernelProvisioner<GenvEnvironmentRegistry<GenvCommand>, GenvDeviceRegistry<GenvCommand>> {
    /// Provisioner backed by the configured `genv` executable.
    pub fn from_config(config: &GenvConfig) -> Self {
        let runner = GenvCommand::from_config(config);
        Self::new(
            GenvEnvironmentRegistry::new(runner.clone(), config.uid),
            GenvDeviceRegistry::new(runner, config.device_lookup),
            config.device_variable.clone(),
        )
    }
}

impl<E, D, P> KernelProvisioner<E, D, P>
where
    E: EnvironmentRegistry,
    D: DeviceRegistry,
    P: DeviceOverrideProvider,
{
    /// Replaces the override provider.
    pub fn with_overrides<Q: DeviceOverrideProvider>(self, overrides: Q) -> KernelProvisioner<E, D, Q> {
        KernelProvisioner {
            envs: self.envs,
            devices: self.devices,
            overrides,
            device_variable: self.device_variable,
        }
    }

    pub fn device_variable(&self) -> &str {
        &self.device_variable
    }

    /// Resolves the devices a kernel may use.
    ///
    /// # Errors
    /// - `Registry` when the environment lookup or device lookup fails.
    pub async fn resolve_assignment(
        &self,
        kernel_id: &KernelId,
        request_override: Option<DeviceOverride>,
    ) -> ProvisionResult<DeviceAssignment> {
        if let Some(devices) =
            request_override.or_else(|| self.overrides.device_override(kernel_id))
        {
            info!(
                "event=provision module=service status=ok kernel_id={kernel_id} source=override indices={:?}",
                devices.indices()
            );
            return Ok(DeviceAssignment {
                kernel_id: kernel_id.clone(),
                eid: None,
                source: AssignmentSource::Override,
                indices: devices.indices,
            });
        }

        let registry_error = |source: RegistryError| {
            error!("event=provision module=service status=error kernel_id={kernel_id} error={source}");
            ProvisionError::Registry {
                kernel_id: kernel_id.to_string(),
                source,
            }
        };

        let (eid, source) = match self
            .envs
            .resolve_environment(kernel_id)
            .await
            .map_err(registry_error)?
        {
            Some(eid) => (eid, AssignmentSource::Registry),
            None => {
                info!(
                    "event=provision module=service status=fallback kernel_id={kernel_id} reason=unbound"
                );
                (kernel_id.to_string(), AssignmentSource::KernelIdFallback)
            }
        };

        // The environment may be deactivated between the two lookups; whatever
        // the device lookup reports is used as-is.
        let indices = self
            .devices
            .resolve_indices(&eid)
            .await
            .map_err(registry_error)?;

        info!(
            "event=provision module=service status=ok kernel_id={kernel_id} eid={eid} indices={indices:?}"
        );
        Ok(DeviceAssignment {
            kernel_id: kernel_id.clone(),
            eid: Some(eid),
            source,
            indices,
        })
    }

    /// Resolves the overlay for one kernel launch attempt.
    pub async fn resolve_overlay(
        &self,
        kernel_id: &KernelId,
        request_override: Option<DeviceOverride>,
    ) -> ProvisionResult<EnvironmentOverlay> {
        let assignment = self.resolve_assignment(kernel_id, request_override).await?;
        Ok(self.overlay_for(&assignment))
    }

    pub fn overlay_for(&self, assignment: &DeviceAssignment) -> EnvironmentOverlay {
        EnvironmentOverlay::for_devices(&self.device_variable, &assignment.indices)
    }
}

impl<E, D, P> LaunchEnvironmentPreparer for KernelProvisioner<E, D, P>
where
    E: EnvironmentRegistry,
    D: DeviceRegistry,
    P: DeviceOverrideProvider,
{
    async fn prepare_environment(
        &self,
        kernel_id: &str,
        base: &HashMap<String, String>,
    ) -> ProvisionResult<HashMap<String, String>> {
        let kernel_id = KernelId::parse(kernel_id)?;
        let overlay = self.resolve_overlay(&kernel_id, None).await?;
        Ok(overlay.apply_to(base))
    }
}
