// Metric aggregation: one monitoring query per (instance, metric), reduced to min/avg/max.

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use crate::cloud::{MetricRequest, MonitoringApi};
use crate::models::{Datapoint, MetricSeries, MetricStats};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Query prefix of the network byte counters, reported in megabytes.
const NETWORK_BYTES_PREFIX: &str = "NetworksBytes";

/// `[start, end)` and the bucket width the backend pre-aggregates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub aggregation: String,
}

impl TimeWindow {
    /// The `days` days up to `now`.
    pub fn ending_at(now: DateTime<Utc>, days: u32, aggregation: &str) -> Self {
        Self {
            start: now - Duration::days(days as i64),
            end: now,
            aggregation: aggregation.to_string(),
        }
    }
}

pub fn is_network_bytes_query(query: &str) -> bool {
    query.starts_with(NETWORK_BYTES_PREFIX)
}

/// Reduces a series. min/max are seeded by the first point and updated with strict
/// comparisons; avg is the arithmetic mean. Unit conversion happens per point, before
/// the reduction. An empty series is `NoData`.
pub fn reduce_series(points: Vec<Datapoint>, to_megabytes: bool) -> MetricSeries {
    let points: Vec<Datapoint> = if to_megabytes {
        points
            .into_iter()
            .map(|p| Datapoint {
                timestamp: p.timestamp,
                value: p.value / BYTES_PER_MEGABYTE,
            })
            .collect()
    } else {
        points
    };

    let Some(first) = points.first() else {
        return MetricSeries::no_data();
    };

    let mut min = first.value;
    let mut max = first.value;
    let mut sum = 0.0;
    for p in &points {
        if p.value < min {
            min = p.value;
        }
        if p.value > max {
            max = p.value;
        }
        sum += p.value;
    }
    let avg = sum / points.len() as f64;

    MetricSeries {
        stats: MetricStats::Summary { min, avg, max },
        points,
    }
}

/// Runs one query over `window`. Transport errors propagate; no retry here beyond the client's.
#[instrument(skip(client, window), fields(operation = "get_metric"))]
pub async fn get_metric<M>(
    client: &M,
    query: &str,
    namespace: &str,
    compartment_id: &str,
    window: &TimeWindow,
) -> anyhow::Result<MetricSeries>
where
    M: MonitoringApi + ?Sized,
{
    let request = MetricRequest {
        namespace: namespace.to_string(),
        query: query.to_string(),
        start_time: window.start,
        end_time: window.end,
    };
    let points = client.summarize_metrics_data(compartment_id, &request).await?;
    Ok(reduce_series(points, is_network_bytes_query(query)))
}
