// Metric reduction and monitoring queries

mod common;

use common::*;
use instance_report::cloud::MonitoringApi;
use instance_report::metrics::{TimeWindow, get_metric, is_network_bytes_query, reduce_series};
use instance_report::models::{MetricStats, NO_DATA};

fn window() -> TimeWindow {
    TimeWindow::ending_at(at(2, 0), 1, "5m")
}

#[test]
fn ten_twenty_thirty() {
    let series = reduce_series(points(&[10.0, 20.0, 30.0]), false);
    assert_eq!(
        series.stats,
        MetricStats::Summary {
            min: 10.0,
            avg: 20.0,
            max: 30.0
        }
    );
    assert_eq!(series.points.len(), 3);
}

#[test]
fn single_point_is_min_avg_and_max() {
    let series = reduce_series(points(&[42.5]), false);
    assert_eq!(series.stats.min(), Some(42.5));
    assert_eq!(series.stats.avg(), Some(42.5));
    assert_eq!(series.stats.max(), Some(42.5));
}

#[test]
fn negative_values_are_not_clamped() {
    let series = reduce_series(points(&[-3.0, -1.0, -2.0]), false);
    assert_eq!(series.stats.min(), Some(-3.0));
    assert_eq!(series.stats.max(), Some(-1.0));
}

#[test]
fn empty_series_is_no_data() {
    let series = reduce_series(Vec::new(), false);
    assert_eq!(series.stats, MetricStats::NoData);
    assert!(series.points.is_empty());
    assert!(!series.has_data());
    assert_eq!(series.stats.cells(), [NO_DATA, NO_DATA, NO_DATA].map(String::from));
}

#[test]
fn min_avg_max_are_ordered_and_avg_is_the_mean() {
    let values = [3.5, 99.0, 0.25, 12.0, 12.0, 7.75, 60.1];
    let series = reduce_series(points(&values), false);
    let (min, avg, max) = match series.stats {
        MetricStats::Summary { min, avg, max } => (min, avg, max),
        MetricStats::NoData => panic!("expected data"),
    };
    assert!(min <= avg && avg <= max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    assert!((avg - mean).abs() < 1e-9);
}

#[test]
fn megabyte_conversion_happens_per_point() {
    let mb = 1024.0 * 1024.0;
    let series = reduce_series(points(&[mb, 3.0 * mb]), true);
    assert_eq!(series.stats.min(), Some(1.0));
    assert_eq!(series.stats.avg(), Some(2.0));
    assert_eq!(series.stats.max(), Some(3.0));
    assert_eq!(series.points[1].value, 3.0);
}

#[test]
fn network_bytes_queries_are_detected_by_prefix() {
    assert!(is_network_bytes_query("NetworksBytesIn[5m]{resourceId = \"x\"}.rate()"));
    assert!(is_network_bytes_query("NetworksBytesOut[1h]{}.mean()"));
    assert!(!is_network_bytes_query("CpuUtilization[5m]{}.mean()"));
    assert!(!is_network_bytes_query("DiskBytesRead[5m]{}.rate()"));
}

#[test]
fn window_spans_the_configured_days() {
    let w = TimeWindow::ending_at(at(8, 12), 7, "1h");
    assert_eq!(w.end, at(8, 12));
    assert_eq!(w.start, at(1, 12));
    assert_eq!(w.aggregation, "1h");
}

#[tokio::test]
async fn get_metric_queries_the_window_and_converts_network_bytes() {
    let mut state = CloudState::new("tenancy-X");
    let q = "NetworksBytesIn[5m]{resourceId = \"i1\"}.rate()";
    state.metrics.insert(q.into(), points(&[2.0 * 1024.0 * 1024.0]));
    let cloud = FakeCloud::new(state);

    let series = get_metric(&cloud, q, "oci_computeagent", "c1", &window()).await.unwrap();
    assert_eq!(series.stats.max(), Some(2.0));
    assert!(cloud.calls().iter().any(|c| c.ends_with(q)));
}

#[tokio::test]
async fn get_metric_without_points_is_no_data_not_an_error() {
    let cloud = FakeCloud::new(CloudState::new("tenancy-X"));
    let series = get_metric(&cloud, "CpuUtilization[5m]{}.mean()", "oci_computeagent", "c1", &window())
        .await
        .unwrap();
    assert!(series.stats.is_no_data());
}

#[tokio::test]
async fn transport_failures_propagate() {
    let mut state = CloudState::new("tenancy-X");
    state.failing.insert("Broken[5m]".into());
    let cloud = FakeCloud::new(state);
    assert!(get_metric(&cloud, "Broken[5m]", "oci_computeagent", "c1", &window()).await.is_err());

    // direct trait use sees the same failure
    let request = instance_report::cloud::MetricRequest {
        namespace: "oci_computeagent".into(),
        query: "Broken[5m]".into(),
        start_time: window().start,
        end_time: window().end,
    };
    assert!(cloud.summarize_metrics_data("c1", &request).await.is_err());
}
