//! Environment snapshot record.

use serde::{Deserialize, Serialize};

/// Logical GPU-usage session registered in the external registry.
///
/// `eid` is the unique key. `created` is kept as the registry's own textual
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub eid: String,
    pub user: String,
    pub name: String,
    pub created: String,
    /// Processes attached to the environment; may be empty.
    pub pids: Vec<u32>,
}
