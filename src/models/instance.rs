// Compute instance records

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub display_name: String,
    pub compartment_id: String,
    #[serde(default)]
    pub availability_domain: String,
    pub lifecycle_state: String,
    pub shape: String,
    #[serde(default)]
    pub shape_config: Option<ShapeConfig>,
    /// Present (any content) only for preemptible instances.
    #[serde(default)]
    pub preemptible_instance_config: Option<serde_json::Value>,
    #[serde(default)]
    pub capacity_reservation_id: Option<String>,
    #[serde(default)]
    pub dedicated_vm_host_id: Option<String>,
    pub time_created: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeConfig {
    #[serde(default)]
    pub ocpus: Option<f64>,
    #[serde(default, rename = "memoryInGBs")]
    pub memory_in_gbs: Option<f64>,
    #[serde(default)]
    pub processor_description: Option<String>,
    #[serde(default)]
    pub baseline_ocpu_utilization: Option<String>,
}

impl Instance {
    pub fn name(&self) -> &str {
        self.display_name.trim()
    }

    pub fn is_preemptible(&self) -> bool {
        self.preemptible_instance_config
            .as_ref()
            .is_some_and(|v| !v.is_null())
    }

    /// Whole days between creation and `now` (never negative).
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.time_created).num_days().max(0)
    }
}

/// Maps a burstable baseline to the guaranteed CPU fraction; "none" when not burstable.
pub fn burstable_label(baseline: Option<&str>) -> String {
    match baseline {
        None | Some("") => "none".into(),
        Some("BASELINE_1_8") => "12.5%".into(),
        Some("BASELINE_1_2") => "50%".into(),
        Some("BASELINE_1_1") => "none".into(),
        Some(other) => other.to_string(),
    }
}
