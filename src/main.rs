use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use colored::*;
use instance_report::*;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

use cli::{AuthMode, Cli};
use cloud::IdentityApi;
use oci_repo::OciRepo;
use oci_repo::credentials::{Credentials, load_profile};
use oci_repo::principal::InstancePrincipal;
use progress::{Progress, Status};

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();
    let progress = Progress::stdout();
    match run(cli, progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            progress.line(Status::Error, &format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, progress: Progress) -> Result<()> {
    // Configuration errors surface here, before any API call.
    let settings = config::ReportConfig::load(&cli.settings)?;
    let queries = definitions::load_metric_queries(&settings.definitions.metric_queries)?;
    let groups = definitions::load_graph_groups(&settings.definitions.graphs, &queries)?;
    let profile = match cli.auth_mode() {
        AuthMode::ConfigFile(path) => Some(load_profile(&path, &cli.profile)?),
        AuthMode::InstancePrincipal => None,
    };

    let http = oci_repo::build_http_client(&settings.api)?;
    let (credentials, region, tenancy_id) = match profile {
        Some(profile) => (
            Credentials::from_profile(&profile)?,
            profile.region.clone(),
            profile.tenancy.clone(),
        ),
        None => {
            let principal = InstancePrincipal::discover(http.clone())
                .await
                .context("instance principal authentication")?;
            let region = principal.region().to_string();
            let tenancy_id = principal.tenancy_id().to_string();
            (
                Credentials::InstancePrincipal(Arc::new(principal)),
                region,
                tenancy_id,
            )
        }
    };
    let client = OciRepo::new(http, credentials, &region, &settings.api);

    let tenancy = client.get_tenancy(&tenancy_id).await?;
    let regions = pipeline::subscribed_regions(&client, &tenancy_id).await?;
    tracing::info!(tenancy = %tenancy.name, regions = regions.len(), "tenancy loaded");

    let now = Utc::now();
    let local = Local::now();
    let stamp = report::run_stamp(local);
    let days = settings.window.time_range_days;
    let job = pipeline::ReportJob {
        tenancy_name: tenancy.name.clone(),
        root_compartment_id: cli.compartment_id.clone().unwrap_or(tenancy_id),
        regions,
        queries,
        groups,
        window: metrics::TimeWindow::ending_at(now, days, &settings.window.aggregation),
        namespace: settings.monitoring.namespace.clone(),
        metric_concurrency: settings.monitoring.metric_concurrency,
        paths: report::ArtifactPaths::new(
            &settings.output.work_dir,
            &settings.output.report_dir,
            &tenancy.name,
            &stamp,
            days,
        ),
        summary_table: settings.output.summary_table,
        archive: settings.output.archive,
        now,
        generated_at: local.format("%Y-%m-%d %H:%M:%S %:z").to_string(),
    };

    progress.note(&format!(
        "Tenancy {} | {} region(s) | last {} day(s), {} aggregation",
        tenancy.name.bold(),
        job.regions.len(),
        days,
        settings.window.aggregation
    ));

    let renderer = chart::PlottersRenderer::new(settings.output.chart_font.as_deref());
    if !renderer.has_font() {
        progress.line(Status::Warn, "No chart font found, charts are drawn without labels");
    }
    let document = Box::new(pdf::PrintPdfDocument::new(settings.output.logo.as_deref())?);
    let summary = pipeline::run_report(
        pipeline::ReportDeps {
            client: &client,
            renderer: &renderer,
            document,
            progress,
        },
        &job,
    )
    .await?;

    progress.section("Summary");
    progress.line(
        Status::Ok,
        &format!(
            "{} instance(s) in {} compartment(s), {} chart(s)",
            summary.instances_reported, summary.compartments, summary.charts
        ),
    );
    for e in &summary.errors {
        progress.line(Status::Error, &e.to_string());
    }
    let output = if summary.archived {
        &job.paths.archive
    } else {
        &job.paths.dir
    };
    progress.line(Status::Ok, &format!("Report: {}", output.display()));
    Ok(())
}
