// Report run: region loop -> attachment index -> compartment loop -> instance loop ->
// metric loop, then PDF assembly and archiving. Fully sequential except for the
// optional per-instance metric fan-out, which keeps definition order.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::archive;
use crate::chart::{ChartArtifact, ChartRenderer, render_instance_charts};
use crate::cloud::{CloudApi, IdentityApi, MonitoringApi};
use crate::definitions::{GraphGroup, MetricQuery};
use crate::inventory::{InventoryError, build_attachment_index, describe_instance, list_instances};
use crate::metrics::{TimeWindow, get_metric};
use crate::models::{Compartment, NamedSeries, ReportRow};
use crate::pdf::{Captions, CoverInfo, InstanceCaption, ReportDocument, SummaryTable, assemble};
use crate::progress::{Progress, Status};
use crate::report::{ArtifactPaths, InventoryCsv, PerformanceCsv};
use crate::resolver::resolve_compartments;

const READY: &str = "READY";

/// What to report on and where to write it.
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub tenancy_name: String,
    /// Scan root: the tenancy itself or one compartment subtree.
    pub root_compartment_id: String,
    pub regions: Vec<String>,
    pub queries: Vec<MetricQuery>,
    pub groups: Vec<GraphGroup>,
    pub window: TimeWindow,
    pub namespace: String,
    pub metric_concurrency: usize,
    pub paths: ArtifactPaths,
    pub summary_table: bool,
    pub archive: bool,
    /// Reference time for instance ages.
    pub now: DateTime<Utc>,
    pub generated_at: String,
}

impl ReportJob {
    pub fn metric_names(&self) -> Vec<String> {
        self.queries.iter().map(|q| q.name.clone()).collect()
    }
}

/// Collaborators of a run. `client` is bound to the home region; every region gets
/// its own copy via `with_region`.
pub struct ReportDeps<'a, C> {
    pub client: &'a C,
    pub renderer: &'a dyn ChartRenderer,
    pub document: Box<dyn ReportDocument>,
    pub progress: Progress,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub compartments: usize,
    pub regions_scanned: usize,
    pub instances_reported: usize,
    pub charts: usize,
    /// Instances that were skipped; the run itself still succeeded.
    pub errors: Vec<InventoryError>,
    pub archived: bool,
}

/// Runs one report. Cloud API and file system errors abort the run; per-instance
/// integrity errors are collected in the summary.
#[instrument(skip_all, fields(operation = "run_report", tenancy = %job.tenancy_name))]
pub async fn run_report<C>(deps: ReportDeps<'_, C>, job: &ReportJob) -> anyhow::Result<RunSummary>
where
    C: CloudApi,
{
    let ReportDeps {
        client,
        renderer,
        mut document,
        progress,
    } = deps;
    let paths = &job.paths;
    archive::prepare_dir(&paths.dir)?;

    let metric_names = job.metric_names();
    let mut inventory_csv = InventoryCsv::create(&paths.inventory_csv)?;
    let mut performance_csv = PerformanceCsv::create(&paths.performance_csv, &metric_names)?;

    progress.section("Resolving compartments");
    let compartments = resolve_compartments(client, &job.root_compartment_id).await?;
    info!(compartments = compartments.len(), "compartments resolved");

    let mut summary = RunSummary {
        compartments: compartments.len(),
        ..RunSummary::default()
    };
    let mut charts: Vec<ChartArtifact> = Vec::new();
    let mut captions = Captions::default();
    let mut rows: Vec<ReportRow> = Vec::new();

    for (n, region) in job.regions.iter().enumerate() {
        progress.region(&format!("[{:02}/{:02}] {}", n + 1, job.regions.len(), region));
        let regional = client.with_region(region);

        let index = build_attachment_index(&regional, &compartments).await?;
        summary.regions_scanned += 1;
        if index.is_empty() {
            progress.line(Status::Warn, "No instances found");
            info!(region = %region, "no instances in region");
            continue;
        }

        for compartment in &compartments {
            progress.compartment(&compartment.name);
            for instance in list_instances(&regional, &compartment.id).await? {
                let record =
                    match describe_instance(&regional, compartment, instance, &index, job.now).await {
                        Ok(record) => record,
                        Err(e) => {
                            progress.line(Status::Error, &e.to_string());
                            warn!(error = %e, instance_id = %e.instance_id(), "instance skipped");
                            summary.errors.push(e);
                            continue;
                        }
                    };
                inventory_csv.append(&record)?;

                let metrics = fetch_metrics(&regional, job, compartment, &record.instance.id).await?;
                let row = ReportRow {
                    inventory: record,
                    metrics,
                };
                performance_csv.append(&row)?;
                report_metric_status(progress, &row);

                let rendered =
                    render_instance_charts(renderer, &paths.dir, &job.tenancy_name, &row, &job.groups);
                if !rendered.is_empty() {
                    captions.insert(&row.inventory.instance.id, InstanceCaption::for_row(&row));
                }
                charts.extend(rendered);
                summary.instances_reported += 1;
                rows.push(row);
            }
        }
    }

    progress.section("Creating PDF report");
    let table = job
        .summary_table
        .then(|| SummaryTable::from_rows(&rows, &metric_names));
    let cover = CoverInfo {
        tenancy: job.tenancy_name.clone(),
        generated_at: job.generated_at.clone(),
        time_range_days: window_days(&job.window),
    };
    summary.charts = assemble(document.as_mut(), &cover, &charts, &captions, table.as_ref())?;
    document.save(&paths.pdf)?;
    progress.line(Status::Ok, &format!("{}", paths.pdf.display()));

    if job.archive {
        progress.section("Creating zip archive");
        archive::archive_and_clean(&paths.dir, &paths.archive)?;
        summary.archived = true;
        progress.line(Status::Ok, &format!("{}", paths.archive.display()));
    }

    info!(
        instances = summary.instances_reported,
        inventory_rows = inventory_csv.rows(),
        performance_rows = performance_csv.rows(),
        charts = summary.charts,
        errors = summary.errors.len(),
        "report finished"
    );
    Ok(summary)
}

/// Every configured metric of one instance, in definition order. At most
/// `metric_concurrency` queries are in flight at once.
pub async fn fetch_metrics<M>(
    client: &M,
    job: &ReportJob,
    compartment: &Compartment,
    instance_id: &str,
) -> anyhow::Result<Vec<NamedSeries>>
where
    M: MonitoringApi + ?Sized,
{
    let results: Vec<anyhow::Result<NamedSeries>> = stream::iter(job.queries.iter().map(|q| async move {
        let query = q.render(&job.window.aggregation, instance_id);
        let series = get_metric(client, &query, &job.namespace, &compartment.id, &job.window).await?;
        Ok(NamedSeries {
            name: q.name.clone(),
            series,
        })
    }))
    .buffered(job.metric_concurrency.max(1))
    .collect()
    .await;
    results.into_iter().collect()
}

/// Subscribed regions, home region first, the rest in the order the identity service
/// lists them. Subscriptions still in progress are skipped.
pub async fn subscribed_regions<I>(identity: &I, tenancy_id: &str) -> anyhow::Result<Vec<String>>
where
    I: IdentityApi + ?Sized,
{
    let mut regions: Vec<(String, bool)> = Vec::new();
    for sub in identity.list_region_subscriptions(tenancy_id).await? {
        if !sub.status.is_empty() && sub.status != READY {
            info!(region = %sub.region_name, status = %sub.status, "region subscription not ready, skipped");
            continue;
        }
        if !regions.iter().any(|(name, _)| *name == sub.region_name) {
            regions.push((sub.region_name, sub.is_home_region));
        }
    }
    regions.sort_by_key(|(_, home)| !home);
    Ok(regions.into_iter().map(|(name, _)| name).collect())
}

fn report_metric_status(progress: Progress, row: &ReportRow) {
    let name = row.inventory.instance.name();
    let missing: Vec<&str> = row
        .metrics
        .iter()
        .filter(|m| !m.series.has_data())
        .map(|m| m.name.as_str())
        .collect();
    if !row.has_any_data() {
        progress.line(Status::Warn, &format!("No metric data for {}", name));
    } else if missing.is_empty() {
        progress.line(Status::Ok, &format!("Got metrics for {}", name));
    } else {
        progress.line(
            Status::Warn,
            &format!("Got metrics for {} (no data: {})", name, missing.join(", ")),
        );
    }
}

fn window_days(window: &TimeWindow) -> u32 {
    (window.end - window.start).num_days().max(0) as u32
}
