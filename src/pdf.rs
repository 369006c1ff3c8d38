// PDF report: cover page, chart pages (three charts each) and an optional landscape
// summary table. Layout decisions live in `assemble`; drawing lives behind `ReportDocument`.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use printpdf::image_crate::{self, DynamicImage};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerIndex, PdfLayerReference, PdfPageIndex, Rgb,
};
use tracing::{debug, warn};

use crate::chart::{ChartArtifact, ChartFileName};
use crate::models::{NO_DATA, ReportRow};

pub const CHARTS_PER_PAGE: usize = 3;
pub const REPORT_TITLE: &str = "Instance Performance Report";

/// Drawing surface for the report. `PrintPdfDocument` writes a real PDF.
pub trait ReportDocument {
    /// Page 1. Called once, before anything else.
    fn cover(&mut self, title: &str, lines: &[String]);
    /// Starts a new portrait page for charts.
    fn new_chart_page(&mut self);
    /// Title, subtitle and chart image below the previous chart on the current page.
    fn chart(&mut self, title: &str, subtitle: &str, image: &Path) -> anyhow::Result<()>;
    /// Landscape pages holding `table`, as many as needed.
    fn table(&mut self, table: &SummaryTable);
    fn save(self: Box<Self>, path: &Path) -> anyhow::Result<()>;
}

/// Text shown above a chart of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCaption {
    pub display_name: String,
    /// `[region] compartment/path`
    pub subtitle: String,
}

impl InstanceCaption {
    pub fn for_row(row: &ReportRow) -> Self {
        Self {
            display_name: row.inventory.instance.name().to_string(),
            subtitle: format!("[{}] {}", row.inventory.region, row.inventory.compartment),
        }
    }
}

/// Captions keyed by lowercased instance id, the form chart file names carry.
#[derive(Debug, Clone, Default)]
pub struct Captions(HashMap<String, InstanceCaption>);

impl Captions {
    pub fn insert(&mut self, instance_id: &str, caption: InstanceCaption) {
        self.0.insert(instance_id.to_lowercase(), caption);
    }

    pub fn get(&self, instance_id: &str) -> Option<&InstanceCaption> {
        self.0.get(&instance_id.to_lowercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SummaryTable {
    /// instance, region, compartment, shape, then avg/max per metric.
    pub fn from_rows(rows: &[ReportRow], metric_names: &[String]) -> Self {
        let mut header: Vec<String> = ["instance", "region", "compartment", "shape"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for name in metric_names {
            header.push(format!("{} avg", name));
            header.push(format!("{} max", name));
        }
        let rows = rows
            .iter()
            .map(|row| {
                let inv = &row.inventory;
                let mut cells = vec![
                    inv.instance.name().to_string(),
                    inv.region.clone(),
                    inv.compartment.clone(),
                    inv.instance.shape.clone(),
                ];
                for name in metric_names {
                    let stats = row
                        .metrics
                        .iter()
                        .find(|m| &m.name == name)
                        .map(|m| m.series.stats);
                    cells.push(fmt_stat(stats.and_then(|s| s.avg())));
                    cells.push(fmt_stat(stats.and_then(|s| s.max())));
                }
                cells
            })
            .collect();
        Self { header, rows }
    }
}

fn fmt_stat(v: Option<f64>) -> String {
    v.map_or_else(|| NO_DATA.to_string(), |v| format!("{:.2}", v))
}

/// Cover and generation details for page 1.
#[derive(Debug, Clone)]
pub struct CoverInfo {
    pub tenancy: String,
    pub generated_at: String,
    pub time_range_days: u32,
}

/// Lays out the report and returns how many charts were embedded.
/// Charts are placed in the given order, a new page opening before the 4th, 7th, ...
/// chart. Every image file is deleted once it has been embedded.
pub fn assemble<D>(
    doc: &mut D,
    cover: &CoverInfo,
    charts: &[ChartArtifact],
    captions: &Captions,
    table: Option<&SummaryTable>,
) -> anyhow::Result<usize>
where
    D: ReportDocument + ?Sized,
{
    doc.cover(
        REPORT_TITLE,
        &[
            format!("Tenancy: {}", cover.tenancy),
            format!("Time range: {} day(s)", cover.time_range_days),
            format!("Generated: {}", cover.generated_at),
        ],
    );

    let mut on_page = CHARTS_PER_PAGE;
    let mut embedded = 0;
    for artifact in charts {
        let file_name = artifact
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let Some(name) = ChartFileName::parse(file_name) else {
            warn!(file = %artifact.path.display(), "not a chart file name, skipped");
            continue;
        };
        let (title, subtitle) = match captions.get(&name.instance_id) {
            Some(c) => (format!("Instance: {}", c.display_name), c.subtitle.clone()),
            None => (format!("Instance: {}", name.instance_name), String::new()),
        };

        if on_page == CHARTS_PER_PAGE {
            doc.new_chart_page();
            on_page = 0;
        }
        doc.chart(&title, &subtitle, &artifact.path)
            .with_context(|| format!("embedding chart {}", artifact.path.display()))?;
        on_page += 1;
        embedded += 1;

        if let Err(e) = std::fs::remove_file(&artifact.path) {
            warn!(error = %e, file = %artifact.path.display(), "could not remove chart image");
        }
    }

    if let Some(table) = table
        && !table.rows.is_empty()
    {
        doc.table(table);
    }
    debug!(charts = embedded, "report assembled");
    Ok(embedded)
}

const A4_SHORT: f32 = 210.0;
const A4_LONG: f32 = 297.0;
const MARGIN: f32 = 10.0;
const HEADER_HEIGHT: f32 = 22.0;
const CHART_WIDTH: f32 = 190.0;
const CHART_MAX_HEIGHT: f32 = 71.0;
const TABLE_ROW_HEIGHT: f32 = 5.0;
const TABLE_FONT_SIZE: f32 = 6.5;
const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, Clone, Copy)]
struct PageRef {
    page: PdfPageIndex,
    layer: PdfLayerIndex,
    width: f32,
}

/// printpdf-backed document using the built-in Helvetica faces.
pub struct PrintPdfDocument {
    doc: PdfDocumentReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    pages: Vec<PageRef>,
    /// Top of the free area on the current page, in mm from the bottom edge.
    cursor: f32,
    logo: Option<DynamicImage>,
}

impl PrintPdfDocument {
    pub fn new(logo: Option<&Path>) -> anyhow::Result<Self> {
        let (doc, page, layer) = PdfDocument::new(REPORT_TITLE, Mm(A4_SHORT), Mm(A4_LONG), "cover");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow::anyhow!("pdf font: {:?}", e))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow::anyhow!("pdf font: {:?}", e))?;
        let italic = doc
            .add_builtin_font(BuiltinFont::HelveticaOblique)
            .map_err(|e| anyhow::anyhow!("pdf font: {:?}", e))?;
        let logo = match logo {
            Some(path) => match image_crate::open(path) {
                Ok(img) => Some(DynamicImage::ImageRgb8(img.to_rgb8())),
                Err(e) => {
                    warn!(error = %e, logo = %path.display(), "logo unreadable, header without logo");
                    None
                }
            },
            None => None,
        };
        Ok(Self {
            doc,
            regular,
            bold,
            italic,
            pages: vec![PageRef {
                page,
                layer,
                width: A4_SHORT,
            }],
            cursor: A4_LONG - MARGIN,
            logo,
        })
    }

    fn layer(&self, page: PageRef) -> PdfLayerReference {
        self.doc.get_page(page.page).get_layer(page.layer)
    }

    fn current(&self) -> PdfLayerReference {
        // pages always holds the cover page
        let page = self.pages[self.pages.len() - 1];
        self.layer(page)
    }

    fn add_page(&mut self, width: f32, height: f32) -> PdfLayerReference {
        let n = self.pages.len() + 1;
        let (page, layer) = self
            .doc
            .add_page(Mm(width), Mm(height), format!("page {}", n));
        let page_ref = PageRef { page, layer, width };
        self.pages.push(page_ref);
        self.cursor = height - HEADER_HEIGHT;
        let layer = self.layer(page_ref);
        self.draw_header(&layer, width, height);
        layer
    }

    fn draw_header(&self, layer: &PdfLayerReference, width: f32, height: f32) {
        if let Some(logo) = &self.logo {
            let dpi = fit_dpi(logo.width(), logo.height(), 40.0, 14.0);
            Image::from_dynamic_image(logo).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(2.0)),
                    translate_y: Some(Mm(height - 16.0)),
                    dpi: Some(dpi),
                    ..Default::default()
                },
            );
        }
        layer.set_fill_color(black());
        let x = centered_x(REPORT_TITLE, 10.0, width);
        layer.use_text(REPORT_TITLE, 10.0, Mm(x), Mm(height - 8.0), &self.bold);
    }

    fn draw_table_page(&mut self, table: &SummaryTable, rows: &[Vec<String>]) {
        let layer = self.add_page(A4_LONG, A4_SHORT);
        let columns = table.header.len().max(1);
        let col_width = (A4_LONG - 2.0 * MARGIN) / columns as f32;
        let max_chars = ((col_width / (TABLE_FONT_SIZE * PT_TO_MM * 0.5)) as usize).max(4);

        let mut y = self.cursor;
        layer.set_fill_color(black());
        for (i, cell) in table.header.iter().enumerate() {
            let x = MARGIN + i as f32 * col_width;
            layer.use_text(clip(cell, max_chars), TABLE_FONT_SIZE, Mm(x), Mm(y), &self.bold);
        }
        for row in rows {
            y -= TABLE_ROW_HEIGHT;
            for (i, cell) in row.iter().enumerate() {
                let x = MARGIN + i as f32 * col_width;
                layer.use_text(clip(cell, max_chars), TABLE_FONT_SIZE, Mm(x), Mm(y), &self.regular);
            }
        }
        self.cursor = y - TABLE_ROW_HEIGHT;
    }
}

impl ReportDocument for PrintPdfDocument {
    fn cover(&mut self, title: &str, lines: &[String]) {
        let layer = self.current();
        layer.set_fill_color(black());
        let mut y = A4_LONG / 2.0 + 10.0;
        layer.use_text(title, 30.0, Mm(centered_x(title, 30.0, A4_SHORT)), Mm(y), &self.bold);
        y -= 16.0;
        for line in lines {
            layer.use_text(line, 12.0, Mm(centered_x(line, 12.0, A4_SHORT)), Mm(y), &self.italic);
            y -= 7.0;
        }
    }

    fn new_chart_page(&mut self) {
        self.add_page(A4_SHORT, A4_LONG);
    }

    fn chart(&mut self, title: &str, subtitle: &str, image: &Path) -> anyhow::Result<()> {
        let img = image_crate::open(image)
            .with_context(|| format!("reading {}", image.display()))?;
        let img = DynamicImage::ImageRgb8(img.to_rgb8());
        let dpi = fit_dpi(img.width(), img.height(), CHART_WIDTH, CHART_MAX_HEIGHT);
        let height = img.height() as f32 * 25.4 / dpi;

        let layer = self.current();
        let mut y = self.cursor - 6.0;
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 1.0, None)));
        layer.use_text(title, 17.0, Mm(MARGIN), Mm(y), &self.bold);
        y -= 5.0;
        layer.set_fill_color(black());
        layer.use_text(subtitle, 9.0, Mm(MARGIN), Mm(y), &self.italic);
        y -= 2.0 + height;
        Image::from_dynamic_image(&img).add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(y)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        self.cursor = y - 3.0;
        Ok(())
    }

    fn table(&mut self, table: &SummaryTable) {
        let per_page =
            (((A4_SHORT - HEADER_HEIGHT - 2.0 * MARGIN) / TABLE_ROW_HEIGHT) as usize).max(1);
        for chunk in table.rows.chunks(per_page) {
            self.draw_table_page(table, chunk);
        }
    }

    fn save(self: Box<Self>, path: &Path) -> anyhow::Result<()> {
        let total = self.pages.len();
        for (i, page) in self.pages.iter().enumerate().skip(1) {
            let layer = self.layer(*page);
            let text = format!("Page {}/{}", i + 1, total);
            layer.set_fill_color(black());
            layer.use_text(&text, 7.0, Mm(centered_x(&text, 7.0, page.width)), Mm(6.0), &self.italic);
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        self.doc
            .save(&mut BufWriter::new(file))
            .map_err(|e| anyhow::anyhow!("writing {}: {:?}", path.display(), e))?;
        Ok(())
    }
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

/// DPI at which a `w`x`h` pixel image fits into `max_w`x`max_h` mm.
fn fit_dpi(w: u32, h: u32, max_w: f32, max_h: f32) -> f32 {
    let by_width = w as f32 * 25.4 / max_w;
    let by_height = h as f32 * 25.4 / max_h;
    by_width.max(by_height).max(1.0)
}

/// Approximate left edge for centered Helvetica text.
fn centered_x(text: &str, size: f32, page_width: f32) -> f32 {
    let width = text.chars().count() as f32 * size * PT_TO_MM * 0.5;
    ((page_width - width) / 2.0).max(MARGIN)
}

fn clip(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars.saturating_sub(2)).collect();
        out.push_str("..");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_dpi_limits_both_dimensions() {
        // 900px over 190mm
        let dpi = fit_dpi(900, 300, 190.0, 71.0);
        assert!((900.0 * 25.4 / dpi) <= 190.01);
        assert!((300.0 * 25.4 / dpi) <= 71.01);
    }

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("web-01", 10), "web-01");
        assert_eq!(clip("a-very-long-instance-name", 8), "a-very..");
    }
}
