// Metric query and graph grouping file parsing

use instance_report::definitions::*;

const QUERIES: &str = "\
# name~query
CpuUtilization~CpuUtilization[###AGGREGATION###]{resourceId = \"###INSTANCE_OCID###\"}.mean()

MemoryUtilization~MemoryUtilization[###AGGREGATION###]{resourceId = \"###INSTANCE_OCID###\"}.mean()
NetworksBytesIn~NetworksBytesIn[###AGGREGATION###]{resourceId = \"###INSTANCE_OCID###\"}.rate()
";

#[test]
fn parses_queries_skipping_comments_and_blank_lines() {
    let queries = parse_metric_queries(QUERIES).unwrap();
    let names: Vec<&str> = queries.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, ["CpuUtilization", "MemoryUtilization", "NetworksBytesIn"]);
}

#[test]
fn render_substitutes_both_placeholders() {
    let queries = parse_metric_queries(QUERIES).unwrap();
    assert_eq!(
        queries[0].render("5m", "ocid1.instance.oc1.sa-saopaulo-1.abc"),
        "CpuUtilization[5m]{resourceId = \"ocid1.instance.oc1.sa-saopaulo-1.abc\"}.mean()"
    );
}

#[test]
fn rejects_lines_without_exactly_one_delimiter() {
    let err = parse_metric_queries("CpuUtilization").unwrap_err();
    assert!(err.to_string().contains("line 1"));
    let err = parse_metric_queries("# c\nA~b~c").unwrap_err();
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn rejects_duplicate_metric_names() {
    let err = parse_metric_queries("A~q1\nA~q2").unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn parses_graph_groups() {
    let groups = parse_graph_groups(
        "# metric:color,...~label\nCpuUtilization:blue,MemoryUtilization:red~Percent (%)\nNetworksBytesIn:green~MB\n",
    )
    .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(
        groups[0].series,
        vec![
            GraphSeries {
                metric: "CpuUtilization".into(),
                color: "blue".into()
            },
            GraphSeries {
                metric: "MemoryUtilization".into(),
                color: "red".into()
            },
        ]
    );
    assert_eq!(groups[0].y_label, "Percent (%)");
    assert_eq!(groups[0].key(), "MemoryUtilization");
    assert_eq!(groups[1].key(), "NetworksBytesIn");
}

#[test]
fn graph_entry_without_color_is_an_error() {
    let err = parse_graph_groups("CpuUtilization~Percent").unwrap_err();
    assert!(err.to_string().contains("metric:color"));
}

#[test]
fn default_groups_give_every_metric_its_own_chart() {
    let queries = parse_metric_queries(QUERIES).unwrap();
    let groups = default_graph_groups(&queries);
    assert_eq!(groups.len(), 3);
    assert!(groups.iter().all(|g| g.series.len() == 1));
    assert_eq!(groups[2].y_label, "NetworksBytesIn");
    assert_eq!(groups[0].series[0].color, "blue");
    assert_eq!(groups[1].series[0].color, "red");
}

#[test]
fn missing_graph_file_falls_back_to_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let queries = parse_metric_queries(QUERIES).unwrap();
    let groups = load_graph_groups(&dir.path().join(".graphs"), &queries).unwrap();
    assert_eq!(groups, default_graph_groups(&queries));
}

#[test]
fn query_file_must_exist_and_define_metrics() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(".metric_query");
    assert!(load_metric_queries(&path).is_err());

    std::fs::write(&path, "# only comments\n").unwrap();
    let err = load_metric_queries(&path).unwrap_err();
    assert!(err.to_string().contains("defines no metrics"));

    std::fs::write(&path, QUERIES).unwrap();
    assert_eq!(load_metric_queries(&path).unwrap().len(), 3);
}

#[test]
fn shipped_definition_files_agree() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let queries = load_metric_queries(&root.join(".metric_query")).unwrap();
    let groups = load_graph_groups(&root.join(".graphs"), &queries).unwrap();
    assert_eq!(queries.len(), 5);
    for series in groups.iter().flat_map(|g| &g.series) {
        assert!(queries.iter().any(|q| q.name == series.metric), "{}", series.metric);
    }
}

#[test]
fn graph_naming_an_undefined_metric_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let queries = parse_metric_queries(QUERIES).unwrap();
    let path = dir.path().join(".graphs");
    std::fs::write(&path, "CpuUtilization:blue,CpuUtilisation:red~Percent\n").unwrap();

    let err = load_graph_groups(&path, &queries).unwrap_err();
    assert!(err.to_string().contains("CpuUtilisation"));

    let ok = parse_graph_groups("CpuUtilization:blue,MemoryUtilization:red~Percent").unwrap();
    assert!(check_graph_metrics(&ok, &queries).is_ok());
}
