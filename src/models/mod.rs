// Domain models (cloud API records + report rows)

mod compartment;
mod identity;
mod instance;
mod metric;
mod report;
mod volume;

pub use compartment::{Compartment, CompartmentRecord, LifecycleState};
pub use identity::{AvailabilityDomain, NamedResource, RegionSubscription, Tenancy};
pub use instance::{Instance, ShapeConfig, burstable_label};
pub use metric::{Datapoint, MetricSeries, MetricStats, NO_DATA, NamedSeries, SummarizedMetric};
pub use report::{
    BlockSummary, BlockVolumeInfo, BootSummary, INVENTORY_HEADER, InventoryRecord, ReportRow,
};
pub use volume::{
    Attachment, AttachmentIndex, BootVolumeAttachment, Image, Volume, VolumeAttachment, VolumeRef,
};
