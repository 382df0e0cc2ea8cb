//! Registry clients over the `genv` control protocol.
//!
//! # Responsibility
//! - Define the device and environment registry contracts used by services.
//! - Translate parsed registry rows into model records.
//!
//! # Invariants
//! - Every operation issues fresh registry queries; nothing is cached.
//! - A kernel id resolves to at most one environment; more is a fatal
//!   `AmbiguousBinding`, never a silent pick.

pub mod device_registry;
pub mod env_registry;

use crate::control::ControlError;
use crate::model::identity::IdentifierError;
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry client error.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Tool failure or malformed output.
    #[error(transparent)]
    Control(#[from] ControlError),
    /// Identifier rejected before any process was spawned.
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
    #[error("kernel `{kernel_id}` is bound to more than one environment: {}", .eids.join(", "))]
    AmbiguousBinding { kernel_id: String, eids: Vec<String> },
    #[error("no user id available for environment activation; set GENVLAB_UID")]
    MissingUid,
}

pub(crate) fn namespaced(namespace: &str, parts: &[&str]) -> Vec<String> {
    std::iter::once(namespace)
        .chain(parts.iter().copied())
        .map(str::to_string)
        .collect()
}
