//! Device registry client.
//!
//! # Responsibility
//! - List device ↔ environment bindings.
//! - Resolve one environment to its device indices, in registry order.
//!
//! # Invariants
//! - Row order from the registry is preserved.
//! - An empty lookup response is an empty index list, not an error.

use crate::control::table::{fields, optional_field, parse_rows, single_line, split_list};
use crate::control::{CommandRunner, ControlError, ControlResult};
use crate::model::device::DeviceBinding;
use crate::model::identity::validate_identifier;
use crate::registry::{namespaced, RegistryResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::str::FromStr;

const DEVICES_NAMESPACE: &str = "devices";

/// Subcommand used to look devices up by environment.
///
/// Older registries answer `find`; later protocol revisions renamed it to
/// `query` with the same output shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceLookupVerb {
    #[default]
    Find,
    Query,
}

impl DeviceLookupVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::Query => "query",
        }
    }
}

impl Display for DeviceLookupVerb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceLookupVerb {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "find" => Ok(Self::Find),
            "query" => Ok(Self::Query),
            other => Err(format!("unsupported device lookup `{other}`; expected find|query")),
        }
    }
}

/// Read access to device bindings.
pub trait DeviceRegistry: Send + Sync {
    fn list_bindings(&self) -> impl Future<Output = RegistryResult<Vec<DeviceBinding>>> + Send;

    fn resolve_indices(&self, eid: &str) -> impl Future<Output = RegistryResult<Vec<u32>>> + Send;
}

/// `genv devices` client.
#[derive(Debug, Clone)]
pub struct GenvDeviceRegistry<R: CommandRunner> {
    runner: R,
    lookup: DeviceLookupVerb,
}

impl<R: CommandRunner> GenvDeviceRegistry<R> {
    pub fn new(runner: R, lookup: DeviceLookupVerb) -> Self {
        Self { runner, lookup }
    }
}

impl<R: CommandRunner> DeviceRegistry for GenvDeviceRegistry<R> {
    async fn list_bindings(&self) -> RegistryResult<Vec<DeviceBinding>> {
        let args = namespaced(
            DEVICES_NAMESPACE,
            &["ps", "--format", "csv", "--no-header", "--timestamp"],
        );
        let stdout = self.runner.execute(&args).await?;
        let bindings = parse_device_bindings(&stdout)?;
        debug!(
            "event=devices_list module=registry status=ok count={}",
            bindings.len()
        );
        Ok(bindings)
    }

    async fn resolve_indices(&self, eid: &str) -> RegistryResult<Vec<u32>> {
        validate_identifier("environment id", eid)?;
        let args = namespaced(DEVICES_NAMESPACE, &[self.lookup.as_str(), "--eid", eid]);
        let stdout = self.runner.execute(&args).await?;
        let indices = parse_device_indices(&stdout)?;
        debug!(
            "event=devices_resolve module=registry status=ok eid={eid} indices={indices:?}"
        );
        Ok(indices)
    }
}

/// Parses `index,eid,env_name,attached` rows.
pub fn parse_device_bindings(text: &str) -> ControlResult<Vec<DeviceBinding>> {
    parse_rows(text)
        .iter()
        .map(|row| {
            let [index, eid, _env_name, _attached] = fields::<4>(row, "devices ps")?;
            let index = index.trim().parse::<u32>().map_err(|_| {
                ControlError::malformed("devices ps", format!("invalid device index `{index}`"))
            })?;
            Ok(DeviceBinding::new(index, optional_field(eid)))
        })
        .collect()
}

/// Parses the single comma-joined index line of a device lookup.
pub fn parse_device_indices(text: &str) -> ControlResult<Vec<u32>> {
    match single_line(text, "devices lookup")? {
        Some(line) => split_list(line, ',', "devices lookup"),
        None => Ok(Vec::new()),
    }
}
