// Denormalized report rows (inventory CSV + performance CSV)

use super::{Instance, NO_DATA, NamedSeries};

/// Inventory CSV header; the column order is part of the output contract.
pub const INVENTORY_HEADER: [&str; 22] = [
    "compartment",
    "instance_name",
    "os_name",
    "os_version",
    "region",
    "lifecycle_state",
    "shape",
    "burstable",
    "preemptible",
    "reservation",
    "dedicated_host",
    "processor_description",
    "ocpus",
    "memory_in_gbs",
    "boot_image_name",
    "boot_size",
    "boot_vpu",
    "block_count",
    "block_size",
    "block_vpu_sum",
    "age(days)",
    "ocid",
];

#[derive(Debug, Clone, PartialEq)]
pub struct BootSummary {
    pub image_name: String,
    pub os_name: String,
    pub os_version: String,
    pub size_in_gbs: Option<i64>,
    pub vpus_per_gb: Option<i64>,
}

impl Default for BootSummary {
    fn default() -> Self {
        Self {
            image_name: NO_DATA.into(),
            os_name: NO_DATA.into(),
            os_version: NO_DATA.into(),
            size_in_gbs: None,
            vpus_per_gb: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockVolumeInfo {
    pub name: String,
    pub size_in_gbs: i64,
    pub vpus_per_gb: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockSummary {
    pub count: usize,
    pub total_size: i64,
    /// Sum of size * VPUs/GB over all block volumes.
    pub vpu_sum: i64,
}

impl BlockSummary {
    pub fn from_volumes(volumes: &[BlockVolumeInfo]) -> Self {
        volumes.iter().fold(Self::default(), |acc, v| Self {
            count: acc.count + 1,
            total_size: acc.total_size + v.size_in_gbs,
            vpu_sum: acc.vpu_sum + v.size_in_gbs * v.vpus_per_gb,
        })
    }
}

/// Everything the inventory stage learned about one instance.
#[derive(Debug, Clone)]
pub struct InventoryRecord {
    /// Compartment path from the scan root.
    pub compartment: String,
    pub region: String,
    pub instance: Instance,
    pub burstable: String,
    pub preemptible: String,
    pub capacity_reservation: String,
    pub dedicated_host: String,
    pub boot: BootSummary,
    pub blocks: Vec<BlockVolumeInfo>,
    pub age_days: i64,
}

impl InventoryRecord {
    pub fn block_summary(&self) -> BlockSummary {
        BlockSummary::from_volumes(&self.blocks)
    }

    /// One inventory CSV record, in `INVENTORY_HEADER` order.
    pub fn csv_record(&self) -> Vec<String> {
        let shape = self.instance.shape_config.clone().unwrap_or_default();
        let blocks = self.block_summary();
        vec![
            self.compartment.clone(),
            self.instance.name().to_string(),
            self.boot.os_name.clone(),
            self.boot.os_version.clone(),
            self.region.clone(),
            self.instance.lifecycle_state.clone(),
            self.instance.shape.clone(),
            self.burstable.clone(),
            self.preemptible.clone(),
            self.capacity_reservation.clone(),
            self.dedicated_host.clone(),
            shape.processor_description.unwrap_or_default(),
            opt(shape.ocpus),
            opt(shape.memory_in_gbs),
            self.boot.image_name.clone(),
            opt(self.boot.size_in_gbs),
            opt(self.boot.vpus_per_gb),
            blocks.count.to_string(),
            blocks.total_size.to_string(),
            blocks.vpu_sum.to_string(),
            self.age_days.to_string(),
            self.instance.id.clone(),
        ]
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map_or_else(|| NO_DATA.to_string(), |v| v.to_string())
}

/// Inventory record joined with its metric series, one per instance.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub inventory: InventoryRecord,
    pub metrics: Vec<NamedSeries>,
}

impl ReportRow {
    pub fn has_any_data(&self) -> bool {
        self.metrics.iter().any(|m| m.series.has_data())
    }

    /// `INSTANCE` cell followed by min/avg/max per metric.
    pub fn performance_record(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(1 + self.metrics.len() * 3);
        row.push(self.inventory.instance.name().to_string());
        for m in &self.metrics {
            row.extend(m.series.stats.cells());
        }
        row
    }
}
