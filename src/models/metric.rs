// Monitoring time series and their min/avg/max reduction

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// CSV / table marker for a statistic with no underlying data.
pub const NO_DATA: &str = "no_data";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// One stream of the summarizeMetricsData response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizedMetric {
    #[serde(default)]
    pub aggregated_datapoints: Vec<Datapoint>,
}

/// Reduced statistics. `NoData` is a regular outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricStats {
    NoData,
    Summary { min: f64, avg: f64, max: f64 },
}

impl MetricStats {
    pub fn is_no_data(&self) -> bool {
        matches!(self, MetricStats::NoData)
    }

    pub fn min(&self) -> Option<f64> {
        match self {
            MetricStats::Summary { min, .. } => Some(*min),
            MetricStats::NoData => None,
        }
    }

    pub fn avg(&self) -> Option<f64> {
        match self {
            MetricStats::Summary { avg, .. } => Some(*avg),
            MetricStats::NoData => None,
        }
    }

    pub fn max(&self) -> Option<f64> {
        match self {
            MetricStats::Summary { max, .. } => Some(*max),
            MetricStats::NoData => None,
        }
    }

    /// `[min, avg, max]` as CSV cells.
    pub fn cells(&self) -> [String; 3] {
        [cell(self.min()), cell(self.avg()), cell(self.max())]
    }
}

fn cell(v: Option<f64>) -> String {
    v.map_or_else(|| NO_DATA.to_string(), |v| format!("{:.2}", v))
}

impl fmt::Display for MetricStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricStats::NoData => f.write_str(NO_DATA),
            MetricStats::Summary { min, avg, max } => {
                write!(f, "min:{:.2}, avg:{:.2}, max:{:.2}", min, avg, max)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub stats: MetricStats,
    /// Points after any unit conversion, in backend order.
    pub points: Vec<Datapoint>,
}

impl MetricSeries {
    pub fn no_data() -> Self {
        Self {
            stats: MetricStats::NoData,
            points: Vec::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.stats.is_no_data()
    }
}

/// A series tagged with the metric name from the query definition file.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSeries {
    pub name: String,
    pub series: MetricSeries,
}
