// Human-edited metric query and graph grouping definitions.
// Lines starting with '#' are comments; blank lines are ignored.

use std::collections::HashSet;
use std::path::Path;

const AGGREGATION_PLACEHOLDER: &str = "###AGGREGATION###";
const INSTANCE_PLACEHOLDER: &str = "###INSTANCE_OCID###";

/// Colors handed out when no graph file exists and every metric gets its own chart.
const DEFAULT_PALETTE: [&str; 6] = ["blue", "red", "green", "orange", "purple", "black"];

/// `name~template`, e.g. `CpuUtilization~CpuUtilization[###AGGREGATION###]{resourceId = "###INSTANCE_OCID###"}.mean()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub name: String,
    pub template: String,
}

impl MetricQuery {
    pub fn render(&self, aggregation: &str, instance_id: &str) -> String {
        self.template
            .replace(AGGREGATION_PLACEHOLDER, aggregation)
            .replace(INSTANCE_PLACEHOLDER, instance_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSeries {
    pub metric: String,
    pub color: String,
}

/// `metric:color,metric:color~y axis label`: metrics sharing one chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphGroup {
    pub series: Vec<GraphSeries>,
    pub y_label: String,
}

impl GraphGroup {
    /// Suffix used in the chart file name (the group's last metric).
    pub fn key(&self) -> &str {
        self.series.last().map(|s| s.metric.as_str()).unwrap_or("graph")
    }
}

fn content_lines(s: &str) -> impl Iterator<Item = (usize, &str)> {
    s.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.starts_with('#') && !l.trim().is_empty())
}

pub fn parse_metric_queries(s: &str) -> anyhow::Result<Vec<MetricQuery>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (n, line) in content_lines(s) {
        let mut fields = line.split('~');
        let (Some(name), Some(template), None) = (fields.next(), fields.next(), fields.next())
        else {
            anyhow::bail!("metric query line {}: expected `name~query`", n);
        };
        let name = name.trim();
        let template = template.trim();
        anyhow::ensure!(
            !name.is_empty() && !template.is_empty(),
            "metric query line {}: name and query must be non-empty",
            n
        );
        anyhow::ensure!(
            seen.insert(name.to_string()),
            "metric query line {}: duplicate metric {:?}",
            n,
            name
        );
        out.push(MetricQuery {
            name: name.to_string(),
            template: template.to_string(),
        });
    }
    Ok(out)
}

pub fn parse_graph_groups(s: &str) -> anyhow::Result<Vec<GraphGroup>> {
    let mut out = Vec::new();
    for (n, line) in content_lines(s) {
        let Some((graphs, y_label)) = line.split_once('~') else {
            anyhow::bail!("graph line {}: expected `metric:color,...~label`", n);
        };
        let mut series = Vec::new();
        for graph in graphs.split(',') {
            let Some((metric, color)) = graph.split_once(':') else {
                anyhow::bail!("graph line {}: expected `metric:color`, got {:?}", n, graph);
            };
            series.push(GraphSeries {
                metric: metric.trim().to_string(),
                color: color.trim().to_string(),
            });
        }
        out.push(GraphGroup {
            series,
            y_label: y_label.trim().to_string(),
        });
    }
    Ok(out)
}

/// One chart per metric, used when no graph file is configured.
pub fn default_graph_groups(queries: &[MetricQuery]) -> Vec<GraphGroup> {
    queries
        .iter()
        .zip(DEFAULT_PALETTE.iter().cycle())
        .map(|(q, color)| GraphGroup {
            series: vec![GraphSeries {
                metric: q.name.clone(),
                color: (*color).to_string(),
            }],
            y_label: q.name.clone(),
        })
        .collect()
}

pub fn load_metric_queries(path: &Path) -> anyhow::Result<Vec<MetricQuery>> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("metric query file {}: {}", path.display(), e))?;
    let queries = parse_metric_queries(&s)?;
    anyhow::ensure!(
        !queries.is_empty(),
        "metric query file {} defines no metrics",
        path.display()
    );
    Ok(queries)
}

pub fn load_graph_groups(path: &Path, queries: &[MetricQuery]) -> anyhow::Result<Vec<GraphGroup>> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "graph file not found, one chart per metric");
        return Ok(default_graph_groups(queries));
    }
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("graph file {}: {}", path.display(), e))?;
    let groups = parse_graph_groups(&s)?;
    check_graph_metrics(&groups, queries)
        .map_err(|e| anyhow::anyhow!("graph file {}: {}", path.display(), e))?;
    Ok(groups)
}

/// Every metric a graph names must be defined in the metric query file.
pub fn check_graph_metrics(groups: &[GraphGroup], queries: &[MetricQuery]) -> anyhow::Result<()> {
    for series in groups.iter().flat_map(|g| &g.series) {
        anyhow::ensure!(
            queries.iter().any(|q| q.name == series.metric),
            "metric `{}` has no query definition",
            series.metric
        );
    }
    Ok(())
}
