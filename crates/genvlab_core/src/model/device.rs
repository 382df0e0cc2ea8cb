//! Device binding snapshot record.

use serde::{Deserialize, Serialize};

/// One physical device slot and the environment occupying it, if any.
///
/// Several bindings may share one `eid` (multi-GPU environment); an `index`
/// appears at most once per snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    /// Physical device index as reported by the registry.
    pub index: u32,
    /// Environment currently attached to this device.
    pub eid: Option<String>,
}

impl DeviceBinding {
    pub fn new(index: u32, eid: Option<String>) -> Self {
        Self { index, eid }
    }
}
