// Compartment tree models

use serde::{Deserialize, Serialize};

/// Lifecycle state shared by identity resources; serializes as the API's upper-case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Creating,
    Active,
    Inactive,
    Deleting,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl LifecycleState {
    pub fn is_active(self) -> bool {
        self == LifecycleState::Active
    }
}

/// Compartment as returned by the identity API (leaf name only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompartmentRecord {
    pub id: String,
    pub name: String,
    pub lifecycle_state: LifecycleState,
}

/// Resolved compartment: `name` is the slash-joined path from the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compartment {
    pub name: String,
    pub id: String,
    pub lifecycle_state: LifecycleState,
}
