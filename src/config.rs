use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default settings path, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "report.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub window: WindowConfig,
    pub monitoring: MonitoringConfig,
    pub definitions: DefinitionsConfig,
    pub output: OutputConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Days of history to query, ending now.
    pub time_range_days: u32,
    /// Backend bucket width: 1m, 5m, 1h or 1d.
    pub aggregation: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub namespace: String,
    /// Metric queries in flight per instance; 1 keeps the run fully sequential.
    pub metric_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefinitionsConfig {
    pub metric_queries: PathBuf,
    pub graphs: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub work_dir: PathBuf,
    pub report_dir: PathBuf,
    /// Append the landscape summary table after the chart pages.
    pub summary_table: bool,
    /// Zip the CSV/PDF artifacts into report_dir and remove the work directory.
    pub archive: bool,
    /// Optional PNG drawn in the header of every chart page.
    pub logo: Option<PathBuf>,
    /// TrueType font for chart text; common system fonts are tried when unset.
    pub chart_font: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Attempts per request, including the first (429, 5xx and transport errors retry).
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            time_range_days: 1,
            aggregation: "5m".into(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            namespace: "oci_computeagent".into(),
            metric_concurrency: 1,
        }
    }
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            metric_queries: PathBuf::from(".metric_query"),
            graphs: PathBuf::from(".graphs"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("work_dir"),
            report_dir: PathBuf::from("reports"),
            summary_table: true,
            archive: true,
            logo: None,
            chart_font: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 60,
        }
    }
}

/// Longest range (days) the monitoring backend returns for each aggregation.
pub fn max_range_days(aggregation: &str) -> Option<u32> {
    match aggregation {
        "1m" => Some(7),
        "5m" => Some(30),
        "1h" | "1d" => Some(90),
        _ => None,
    }
}

impl ReportConfig {
    /// Loads settings from `path`. A missing file is only tolerated for the default path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() && path == Path::new(DEFAULT_SETTINGS_FILE) {
            tracing::info!(path = %path.display(), "settings file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("settings file {}: {}", path.display(), e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate settings from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: ReportConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=90).contains(&self.window.time_range_days),
            "window.time_range_days must be between 1 and 90, got {}",
            self.window.time_range_days
        );
        let Some(max_days) = max_range_days(&self.window.aggregation) else {
            anyhow::bail!(
                "window.aggregation must be one of 1m, 5m, 1h, 1d, got {:?}",
                self.window.aggregation
            );
        };
        anyhow::ensure!(
            self.window.time_range_days <= max_days,
            "window.time_range_days {} exceeds the {} day maximum for aggregation {}",
            self.window.time_range_days,
            max_days,
            self.window.aggregation
        );
        anyhow::ensure!(
            !self.monitoring.namespace.trim().is_empty(),
            "monitoring.namespace must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.metric_concurrency > 0,
            "monitoring.metric_concurrency must be > 0, got {}",
            self.monitoring.metric_concurrency
        );
        anyhow::ensure!(
            !self.definitions.metric_queries.as_os_str().is_empty(),
            "definitions.metric_queries must be non-empty"
        );
        anyhow::ensure!(
            !self.output.work_dir.as_os_str().is_empty(),
            "output.work_dir must be non-empty"
        );
        anyhow::ensure!(
            !self.output.report_dir.as_os_str().is_empty(),
            "output.report_dir must be non-empty"
        );
        anyhow::ensure!(
            self.api.max_attempts > 0,
            "api.max_attempts must be > 0, got {}",
            self.api.max_attempts
        );
        anyhow::ensure!(
            self.api.timeout_secs > 0,
            "api.timeout_secs must be > 0, got {}",
            self.api.timeout_secs
        );
        Ok(())
    }
}
