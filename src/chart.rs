// Per-instance chart images. One PNG per graph group that has data; the file name
// carries tenancy, instance name and instance id so the PDF stage can find the instance again.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use tracing::{info, warn};

use crate::definitions::GraphGroup;
use crate::models::{MetricStats, NamedSeries, ReportRow};

pub const NAME_DELIMITER: char = '~';
const CHART_EXTENSION: &str = ".png";
const CHART_SIZE: (u32, u32) = (900, 300);
const X_AXIS_LABEL: &str = "Timeaxis (day)";

const FONT_CANDIDATES: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// `<tenancy>~<instance name>~<instance id>_<group>.png`, all lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFileName {
    pub tenancy: String,
    pub instance_name: String,
    pub instance_id: String,
    pub group: String,
}

impl ChartFileName {
    pub fn new(tenancy: &str, instance_name: &str, instance_id: &str, group: &str) -> Self {
        Self {
            tenancy: sanitize(tenancy),
            instance_name: sanitize(instance_name),
            instance_id: sanitize(instance_id),
            group: sanitize(group).replace('_', "-"),
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{d}{}{d}{}_{}{}",
            self.tenancy,
            self.instance_name,
            self.instance_id,
            self.group,
            CHART_EXTENSION,
            d = NAME_DELIMITER
        )
    }

    /// Inverse of `file_name`; `None` for files that are not charts.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(CHART_EXTENSION)?;
        let mut parts = stem.splitn(3, NAME_DELIMITER);
        let tenancy = parts.next()?;
        let instance_name = parts.next()?;
        let (instance_id, group) = parts.next()?.split_once('_')?;
        Some(Self {
            tenancy: tenancy.to_string(),
            instance_name: instance_name.to_string(),
            instance_id: instance_id.to_string(),
            group: group.to_string(),
        })
    }
}

fn sanitize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            NAME_DELIMITER | '/' | '\\' => '-',
            c => c,
        })
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartLine {
    pub label: String,
    pub color: String,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

/// What to draw for one graph group of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub y_label: String,
    pub lines: Vec<ChartLine>,
}

impl ChartSpec {
    /// Lines for the group's metrics that have data; `None` when none has.
    pub fn for_group(group: &GraphGroup, metrics: &[NamedSeries]) -> Option<Self> {
        let lines: Vec<ChartLine> = group
            .series
            .iter()
            .filter_map(|s| {
                let m = metrics.iter().find(|m| m.name == s.metric)?;
                let MetricStats::Summary { min, avg, max } = m.series.stats else {
                    return None;
                };
                Some(ChartLine {
                    label: format!(
                        "{} | min:{:.2}, avg:{:.2}, max:{:.2}",
                        m.name, min, avg, max
                    ),
                    color: s.color.clone(),
                    points: m
                        .series
                        .points
                        .iter()
                        .map(|p| (p.timestamp, p.value))
                        .collect(),
                })
            })
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(Self {
                y_label: group.y_label.clone(),
                lines,
            })
        }
    }

    fn time_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let mut it = self.lines.iter().flat_map(|l| l.points.iter().map(|p| p.0));
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    fn value_bounds(&self) -> (f64, f64) {
        let (lo, hi) = self
            .lines
            .iter()
            .flat_map(|l| l.points.iter().map(|p| p.1))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        let pad = ((hi - lo) * 0.05).max(0.5);
        (lo.min(0.0).min(lo - pad), hi + pad)
    }
}

/// A chart written to disk, waiting to be embedded in the PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartArtifact {
    pub path: PathBuf,
    pub name: ChartFileName,
}

pub trait ChartRenderer {
    fn render(&self, path: &Path, chart: &ChartSpec) -> anyhow::Result<()>;
}

/// Writes every chart of one instance into `dir`. A chart that fails to render is
/// logged and skipped; metrics without data are never drawn.
pub fn render_instance_charts<R>(
    renderer: &R,
    dir: &Path,
    tenancy: &str,
    row: &ReportRow,
    groups: &[GraphGroup],
) -> Vec<ChartArtifact>
where
    R: ChartRenderer + ?Sized,
{
    let instance = &row.inventory.instance;
    let mut out = Vec::new();
    for group in groups {
        let Some(spec) = ChartSpec::for_group(group, &row.metrics) else {
            continue;
        };
        let name = ChartFileName::new(tenancy, instance.name(), &instance.id, group.key());
        let path = dir.join(name.file_name());
        match renderer.render(&path, &spec) {
            Ok(()) => out.push(ChartArtifact { path, name }),
            Err(e) => warn!(error = %e, instance = %instance.name(), group = %group.key(), "chart rendering failed"),
        }
    }
    out
}

/// PNG charts via plotters' bitmap backend.
pub struct PlottersRenderer {
    has_font: bool,
}

impl PlottersRenderer {
    /// Registers `font` (or the first system font found) for chart text. Without a font
    /// charts are still drawn, just without labels and legend.
    pub fn new(font: Option<&Path>) -> Self {
        let candidate = match font {
            Some(p) => Some(p.to_path_buf()),
            None => FONT_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .find(|p| p.is_file()),
        };
        let has_font = match candidate {
            Some(path) => match register_chart_font(&path) {
                Ok(()) => {
                    info!(font = %path.display(), "chart font registered");
                    true
                }
                Err(e) => {
                    warn!(error = %e, font = %path.display(), "chart font unusable, charts without text");
                    false
                }
            },
            None => {
                warn!("no chart font found, charts without text");
                false
            }
        };
        Self { has_font }
    }

    /// Whether chart text (axes, legend) can be drawn.
    pub fn has_font(&self) -> bool {
        self.has_font
    }
}

fn register_chart_font(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)?;
    // plotters keeps registered fonts for the life of the process.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    plotters::style::register_font("sans-serif", FontStyle::Normal, bytes)
        .map_err(|_| anyhow::anyhow!("not a TrueType font"))
}

fn draw_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("chart drawing failed: {}", e)
}

/// Named matplotlib-style colors plus `#rrggbb`.
pub fn parse_color(s: &str) -> Option<RGBColor> {
    let s = s.trim().to_ascii_lowercase();
    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let v = u32::from_str_radix(hex, 16).ok()?;
        return Some(RGBColor((v >> 16) as u8, (v >> 8) as u8, v as u8));
    }
    let rgb = match s.trim_start_matches("tab:") {
        "blue" => (31, 119, 180),
        "orange" => (255, 127, 14),
        "green" => (44, 160, 44),
        "red" => (214, 39, 40),
        "purple" => (148, 103, 189),
        "brown" => (140, 86, 75),
        "pink" => (227, 119, 194),
        "gray" | "grey" => (127, 127, 127),
        "olive" => (188, 189, 34),
        "cyan" => (23, 190, 207),
        "black" => (0, 0, 0),
        "yellow" => (230, 200, 0),
        "magenta" => (200, 0, 200),
        _ => return None,
    };
    Some(RGBColor(rgb.0, rgb.1, rgb.2))
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, path: &Path, chart: &ChartSpec) -> anyhow::Result<()> {
        let (start, end) = chart
            .time_bounds()
            .ok_or_else(|| anyhow::anyhow!("chart without datapoints"))?;
        // x axis in hours since the first point; labels map back to timestamps
        let span_hours = ((end - start).num_seconds() as f64 / 3600.0).max(1.0);
        let (y_min, y_max) = chart.value_bounds();
        let to_x = |t: DateTime<Utc>| (t - start).num_seconds() as f64 / 3600.0;
        let x_label = |h: &f64| (start + Duration::seconds((h * 3600.0) as i64)).format("%d/%m %H:%M").to_string();

        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let mut ctx = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(if self.has_font { 40 } else { 5 })
            .y_label_area_size(if self.has_font { 60 } else { 5 })
            .build_cartesian_2d(0f64..span_hours, y_min..y_max)
            .map_err(draw_err)?;

        if self.has_font {
            ctx.configure_mesh()
                .x_desc(X_AXIS_LABEL)
                .y_desc(chart.y_label.as_str())
                .x_labels(8)
                .x_label_formatter(&x_label)
                .draw()
                .map_err(draw_err)?;
        } else {
            ctx.configure_mesh()
                .x_labels(0)
                .y_labels(0)
                .draw()
                .map_err(draw_err)?;
        }

        for line in &chart.lines {
            let color = parse_color(&line.color).unwrap_or(BLACK);
            let series = ctx
                .draw_series(LineSeries::new(
                    line.points.iter().map(|(t, v)| (to_x(*t), *v)),
                    color.stroke_width(1),
                ))
                .map_err(draw_err)?;
            if self.has_font {
                series
                    .label(line.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
            }
        }

        if self.has_font {
            ctx.configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(draw_err)?;
        }
        root.present().map_err(draw_err)?;
        Ok(())
    }
}
