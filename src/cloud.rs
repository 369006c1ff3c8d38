// Cloud API seams. `OciRepo` is the production implementation; tests use an in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AvailabilityDomain, BootVolumeAttachment, CompartmentRecord, Datapoint, Image, Instance,
    NamedResource, RegionSubscription, Tenancy, Volume, VolumeAttachment,
};

#[async_trait]
pub trait IdentityApi {
    async fn get_tenancy(&self, tenancy_id: &str) -> anyhow::Result<Tenancy>;
    async fn list_region_subscriptions(
        &self,
        tenancy_id: &str,
    ) -> anyhow::Result<Vec<RegionSubscription>>;
    async fn get_compartment(&self, compartment_id: &str) -> anyhow::Result<CompartmentRecord>;
    /// Direct children only, in every lifecycle state.
    async fn list_compartments(&self, parent_id: &str) -> anyhow::Result<Vec<CompartmentRecord>>;
    async fn list_availability_domains(
        &self,
        compartment_id: &str,
    ) -> anyhow::Result<Vec<AvailabilityDomain>>;
}

#[async_trait]
pub trait ComputeApi {
    async fn list_instances(&self, compartment_id: &str) -> anyhow::Result<Vec<Instance>>;
    async fn list_boot_volume_attachments(
        &self,
        availability_domain: &str,
        compartment_id: &str,
    ) -> anyhow::Result<Vec<BootVolumeAttachment>>;
    async fn list_volume_attachments(
        &self,
        availability_domain: &str,
        compartment_id: &str,
    ) -> anyhow::Result<Vec<VolumeAttachment>>;
    async fn get_capacity_reservation(&self, id: &str) -> anyhow::Result<NamedResource>;
    async fn get_dedicated_vm_host(&self, id: &str) -> anyhow::Result<NamedResource>;
}

#[async_trait]
pub trait BlockStorageApi {
    async fn get_boot_volume(&self, id: &str) -> anyhow::Result<Volume>;
    async fn get_volume(&self, id: &str) -> anyhow::Result<Volume>;
}

/// Image lookup that can target another region than the client's own
/// (boot volumes keep the image id of the region they were created in).
#[async_trait]
pub trait ImageResolver {
    async fn get_image(&self, image_id: &str, region: Option<&str>) -> anyhow::Result<Image>;
}

/// One summarizeMetricsData request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRequest {
    pub namespace: String,
    pub query: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[async_trait]
pub trait MonitoringApi {
    /// Datapoints of the first returned stream; empty when the backend has none.
    async fn summarize_metrics_data(
        &self,
        compartment_id: &str,
        request: &MetricRequest,
    ) -> anyhow::Result<Vec<Datapoint>>;
}

/// Everything the report pipeline needs, bound to one region.
pub trait CloudApi:
    IdentityApi + ComputeApi + BlockStorageApi + ImageResolver + MonitoringApi + Send + Sync
{
    fn region(&self) -> &str;
    fn with_region(&self, region: &str) -> Self
    where
        Self: Sized;
}
