//! Launch environment overlay.
//!
//! # Invariants
//! - An overlay is applied on top of a base environment; it never removes
//!   base variables.
//! - The device-visibility variable is always present once resolved. An empty
//!   device list yields an empty value ("no devices"), never an unset one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Default device-visibility variable consumed by CUDA runtimes.
pub const DEFAULT_DEVICE_VARIABLE: &str = "CUDA_VISIBLE_DEVICES";

/// Variables to set on a kernel process before launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvironmentOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the overlay for one resolved device list.
    pub fn for_devices(variable: &str, indices: &[u32]) -> Self {
        let mut overlay = Self::new();
        overlay.set(variable, join_indices(indices));
        overlay
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns a copy of `base` with every overlay variable applied.
    pub fn apply_to(&self, base: &HashMap<String, String>) -> HashMap<String, String> {
        let mut merged = base.clone();
        for (name, value) in &self.vars {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

/// Joins device indices with `,`, preserving order.
pub fn join_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
