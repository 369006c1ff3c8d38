// Shared test helpers: an in-memory cloud keyed by region, and recording chart/PDF fakes

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use instance_report::chart::{ChartRenderer, ChartSpec};
use instance_report::cloud::{
    BlockStorageApi, CloudApi, ComputeApi, IdentityApi, ImageResolver, MetricRequest,
    MonitoringApi,
};
use instance_report::models::*;
use instance_report::pdf::{ReportDocument, SummaryTable};

pub const TENANCY_ID: &str = "ocid1.tenancy.oc1..tenancyx";
pub const HOME: &str = "sa-saopaulo-1";
pub const AD1: &str = "kWVD:SA-SAOPAULO-1-AD-1";

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

pub fn points(values: &[f64]) -> Vec<Datapoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Datapoint {
            timestamp: at(1, 0) + chrono::Duration::minutes(5 * i as i64),
            value: *v,
        })
        .collect()
}

pub fn instance(id: &str, name: &str, compartment_id: &str) -> Instance {
    Instance {
        id: id.into(),
        display_name: name.into(),
        compartment_id: compartment_id.into(),
        availability_domain: AD1.into(),
        lifecycle_state: "RUNNING".into(),
        shape: "VM.Standard.E4.Flex".into(),
        shape_config: Some(ShapeConfig {
            ocpus: Some(2.0),
            memory_in_gbs: Some(16.0),
            processor_description: Some("2.55 GHz AMD EPYC 7J13".into()),
            baseline_ocpu_utilization: None,
        }),
        preemptible_instance_config: None,
        capacity_reservation_id: None,
        dedicated_vm_host_id: None,
        time_created: at(1, 0) - chrono::Duration::days(30),
    }
}

pub fn volume(id: &str, name: &str, size: i64, vpus: i64, image_id: Option<&str>) -> Volume {
    Volume {
        id: id.into(),
        display_name: name.into(),
        size_in_gbs: Some(size),
        vpus_per_gb: Some(vpus),
        image_id: image_id.map(String::from),
    }
}

pub fn image(id: &str, name: &str) -> Image {
    Image {
        id: id.into(),
        display_name: name.into(),
        operating_system: "Oracle Linux".into(),
        operating_system_version: "8".into(),
    }
}

/// Everything the fake cloud knows. Regional resources are keyed by region name.
#[derive(Default)]
pub struct CloudState {
    pub tenancy_name: String,
    pub subscriptions: Vec<RegionSubscription>,
    pub compartments: HashMap<String, CompartmentRecord>,
    pub children: HashMap<String, Vec<String>>,
    pub ads: HashMap<String, Vec<String>>,
    pub instances: HashMap<(String, String), Vec<Instance>>,
    pub boot_attachments: HashMap<(String, String, String), Vec<BootVolumeAttachment>>,
    pub volume_attachments: HashMap<(String, String, String), Vec<VolumeAttachment>>,
    pub boot_volumes: HashMap<String, Volume>,
    pub volumes: HashMap<String, Volume>,
    pub images: HashMap<(String, String), Image>,
    pub reservations: HashMap<String, NamedResource>,
    pub hosts: HashMap<String, NamedResource>,
    /// Datapoints by rendered query string; unknown queries return no data.
    pub metrics: HashMap<String, Vec<Datapoint>>,
    pub failing: HashSet<String>,
}

impl CloudState {
    pub fn new(tenancy_name: &str) -> Self {
        let mut state = Self {
            tenancy_name: tenancy_name.into(),
            ..Self::default()
        };
        state.compartments.insert(
            TENANCY_ID.into(),
            CompartmentRecord {
                id: TENANCY_ID.into(),
                name: tenancy_name.into(),
                lifecycle_state: LifecycleState::Active,
            },
        );
        state.add_region(HOME);
        state
    }

    pub fn add_region(&mut self, region: &str) {
        self.subscriptions.push(RegionSubscription {
            region_name: region.into(),
            status: "READY".into(),
            is_home_region: region == HOME,
        });
        self.ads.insert(region.into(), vec![AD1.into()]);
    }

    pub fn add_compartment(&mut self, parent: &str, id: &str, name: &str, state: LifecycleState) {
        self.compartments.insert(
            id.into(),
            CompartmentRecord {
                id: id.into(),
                name: name.into(),
                lifecycle_state: state,
            },
        );
        self.children.entry(parent.into()).or_default().push(id.into());
    }

    /// Instance with a boot volume attached in AD1 of `region`.
    pub fn add_instance(&mut self, region: &str, instance: Instance, boot: Volume) {
        let key = (region.to_string(), AD1.to_string(), instance.compartment_id.clone());
        self.boot_attachments.entry(key).or_default().push(BootVolumeAttachment {
            instance_id: instance.id.clone(),
            boot_volume_id: boot.id.clone(),
            compartment_id: instance.compartment_id.clone(),
            availability_domain: AD1.into(),
            lifecycle_state: "ATTACHED".into(),
        });
        self.boot_volumes.insert(boot.id.clone(), boot);
        self.add_bare_instance(region, instance);
    }

    /// Instance without any boot attachment.
    pub fn add_bare_instance(&mut self, region: &str, instance: Instance) {
        self.instances
            .entry((region.to_string(), instance.compartment_id.clone()))
            .or_default()
            .push(instance);
    }

    pub fn attach_volume(&mut self, region: &str, compartment: &str, instance_id: &str, volume_id: &str, state: &str) {
        let key = (region.to_string(), AD1.to_string(), compartment.to_string());
        self.volume_attachments.entry(key).or_default().push(VolumeAttachment {
            instance_id: instance_id.into(),
            volume_id: volume_id.into(),
            lifecycle_state: state.into(),
            display_name: None,
        });
    }

    pub fn add_image(&mut self, region: &str, image: Image) {
        self.images.insert((region.into(), image.id.clone()), image);
    }
}

/// In-memory `CloudApi`. Every call is recorded as `<region> <call> <args>`.
#[derive(Clone)]
pub struct FakeCloud {
    state: Arc<CloudState>,
    region: String,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeCloud {
    pub fn new(state: CloudState) -> Self {
        Self {
            state: Arc::new(state),
            region: HOME.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(format!("{} {}", self.region, call));
    }

    fn check(&self, id: &str) -> anyhow::Result<()> {
        if self.state.failing.contains(id) {
            anyhow::bail!("injected failure for {}", id);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityApi for FakeCloud {
    async fn get_tenancy(&self, tenancy_id: &str) -> anyhow::Result<Tenancy> {
        self.record(format!("get_tenancy {}", tenancy_id));
        Ok(Tenancy {
            id: tenancy_id.into(),
            name: self.state.tenancy_name.clone(),
        })
    }

    async fn list_region_subscriptions(&self, _tenancy_id: &str) -> anyhow::Result<Vec<RegionSubscription>> {
        self.record("list_region_subscriptions".into());
        Ok(self.state.subscriptions.clone())
    }

    async fn get_compartment(&self, compartment_id: &str) -> anyhow::Result<CompartmentRecord> {
        self.record(format!("get_compartment {}", compartment_id));
        self.check(compartment_id)?;
        self.state
            .compartments
            .get(compartment_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("compartment {} not found", compartment_id))
    }

    async fn list_compartments(&self, parent_id: &str) -> anyhow::Result<Vec<CompartmentRecord>> {
        self.record(format!("list_compartments {}", parent_id));
        self.check(parent_id)?;
        Ok(self
            .state
            .children
            .get(parent_id)
            .map(|ids| ids.iter().map(|id| self.state.compartments[id].clone()).collect())
            .unwrap_or_default())
    }

    async fn list_availability_domains(&self, _compartment_id: &str) -> anyhow::Result<Vec<AvailabilityDomain>> {
        Ok(self
            .state
            .ads
            .get(&self.region)
            .map(|ads| ads.iter().map(|name| AvailabilityDomain { name: name.clone() }).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ComputeApi for FakeCloud {
    async fn list_instances(&self, compartment_id: &str) -> anyhow::Result<Vec<Instance>> {
        self.record(format!("list_instances {}", compartment_id));
        Ok(self
            .state
            .instances
            .get(&(self.region.clone(), compartment_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_boot_volume_attachments(
        &self,
        availability_domain: &str,
        compartment_id: &str,
    ) -> anyhow::Result<Vec<BootVolumeAttachment>> {
        self.record(format!("list_boot_volume_attachments {}", compartment_id));
        let key = (self.region.clone(), availability_domain.to_string(), compartment_id.to_string());
        Ok(self.state.boot_attachments.get(&key).cloned().unwrap_or_default())
    }

    async fn list_volume_attachments(
        &self,
        availability_domain: &str,
        compartment_id: &str,
    ) -> anyhow::Result<Vec<VolumeAttachment>> {
        self.record(format!("list_volume_attachments {}", compartment_id));
        let key = (self.region.clone(), availability_domain.to_string(), compartment_id.to_string());
        Ok(self.state.volume_attachments.get(&key).cloned().unwrap_or_default())
    }

    async fn get_capacity_reservation(&self, id: &str) -> anyhow::Result<NamedResource> {
        self.check(id)?;
        self.state
            .reservations
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("reservation {} not found", id))
    }

    async fn get_dedicated_vm_host(&self, id: &str) -> anyhow::Result<NamedResource> {
        self.check(id)?;
        self.state
            .hosts
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("host {} not found", id))
    }
}

#[async_trait]
impl BlockStorageApi for FakeCloud {
    async fn get_boot_volume(&self, id: &str) -> anyhow::Result<Volume> {
        self.record(format!("get_boot_volume {}", id));
        self.check(id)?;
        self.state
            .boot_volumes
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("boot volume {} not found", id))
    }

    async fn get_volume(&self, id: &str) -> anyhow::Result<Volume> {
        self.record(format!("get_volume {}", id));
        self.check(id)?;
        self.state
            .volumes
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("volume {} not found", id))
    }
}

#[async_trait]
impl ImageResolver for FakeCloud {
    async fn get_image(&self, image_id: &str, region: Option<&str>) -> anyhow::Result<Image> {
        let region = region.unwrap_or(&self.region).to_string();
        self.record(format!("get_image {} {}", region, image_id));
        self.check(image_id)?;
        self.state
            .images
            .get(&(region.clone(), image_id.to_string()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("image {} not found in {}", image_id, region))
    }
}

#[async_trait]
impl MonitoringApi for FakeCloud {
    async fn summarize_metrics_data(
        &self,
        _compartment_id: &str,
        request: &MetricRequest,
    ) -> anyhow::Result<Vec<Datapoint>> {
        self.record(format!("summarize_metrics_data {}", request.query));
        self.check(&request.query)?;
        Ok(self.state.metrics.get(&request.query).cloned().unwrap_or_default())
    }
}

impl CloudApi for FakeCloud {
    fn region(&self) -> &str {
        &self.region
    }

    fn with_region(&self, region: &str) -> Self {
        Self {
            state: self.state.clone(),
            region: region.into(),
            calls: self.calls.clone(),
        }
    }
}

/// Writes a placeholder file per chart and remembers what it was asked to draw.
#[derive(Default)]
pub struct RecordingRenderer {
    pub rendered: Mutex<Vec<(PathBuf, ChartSpec)>>,
    pub fail_on: Option<String>,
}

impl RecordingRenderer {
    pub fn file_names(&self) -> Vec<String> {
        self.rendered
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

impl ChartRenderer for RecordingRenderer {
    fn render(&self, path: &Path, chart: &ChartSpec) -> anyhow::Result<()> {
        if let Some(fail) = &self.fail_on
            && path.to_string_lossy().contains(fail.as_str())
        {
            anyhow::bail!("injected render failure");
        }
        std::fs::write(path, b"png")?;
        self.rendered.lock().unwrap().push((path.to_path_buf(), chart.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocEvent {
    Cover(String),
    ChartPage,
    Chart {
        title: String,
        subtitle: String,
        image: PathBuf,
        image_existed: bool,
    },
    Table(SummaryTable),
    Saved(PathBuf),
}

/// `ReportDocument` that records calls; `events` stays readable after the document is consumed.
#[derive(Default, Clone)]
pub struct RecordingDocument {
    pub events: Arc<Mutex<Vec<DocEvent>>>,
}

impl RecordingDocument {
    pub fn events(&self) -> Vec<DocEvent> {
        self.events.lock().unwrap().clone()
    }

    /// (page number, chart title) for every chart; the cover is page 1.
    pub fn chart_pages(&self) -> Vec<(usize, String)> {
        let mut page = 0;
        let mut out = Vec::new();
        for e in self.events() {
            match e {
                DocEvent::Cover(_) | DocEvent::ChartPage => page += 1,
                DocEvent::Chart { title, .. } => out.push((page, title)),
                _ => {}
            }
        }
        out
    }
}

impl ReportDocument for RecordingDocument {
    fn cover(&mut self, title: &str, _lines: &[String]) {
        self.events.lock().unwrap().push(DocEvent::Cover(title.into()));
    }

    fn new_chart_page(&mut self) {
        self.events.lock().unwrap().push(DocEvent::ChartPage);
    }

    fn chart(&mut self, title: &str, subtitle: &str, image: &Path) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(DocEvent::Chart {
            title: title.into(),
            subtitle: subtitle.into(),
            image: image.to_path_buf(),
            image_existed: image.exists(),
        });
        Ok(())
    }

    fn table(&mut self, table: &SummaryTable) {
        self.events.lock().unwrap().push(DocEvent::Table(table.clone()));
    }

    fn save(self: Box<Self>, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, b"%PDF-1.3 recorded")?;
        self.events.lock().unwrap().push(DocEvent::Saved(path.to_path_buf()));
        Ok(())
    }
}
