// CSV outputs and artifact naming for one report run.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};

use crate::models::{INVENTORY_HEADER, InventoryRecord, ReportRow};

/// Timestamp embedded in every artifact name of a run.
pub fn run_stamp(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Paths of everything one run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// `<work_dir>/<tenancy>`; charts, CSVs and the PDF are written here.
    pub dir: PathBuf,
    pub inventory_csv: PathBuf,
    pub performance_csv: PathBuf,
    pub pdf: PathBuf,
    pub archive: PathBuf,
}

impl ArtifactPaths {
    pub fn new(work_dir: &Path, report_dir: &Path, tenancy: &str, stamp: &str, days: u32) -> Self {
        let tenancy = &path_component(tenancy);
        let dir = work_dir.join(tenancy);
        Self {
            inventory_csv: dir.join(format!("{}_instance_list_{}.csv", tenancy, stamp)),
            performance_csv: dir.join(format!(
                "{}_instance_performance_data_{}-{}_days.csv",
                tenancy, stamp, days
            )),
            pdf: dir.join(format!(
                "{}_instance_performance_data_{}-{}_days.pdf",
                tenancy, stamp, days
            )),
            archive: report_dir.join(format!(
                "{}_{}_performance_report-{}_days.zip",
                stamp, tenancy, days
            )),
            dir,
        }
    }
}

/// A tenancy name made safe as one path component: separators become `-`, and a name
/// that is empty or only dots (which would resolve outside `work_dir`) becomes `tenancy`.
fn path_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        "tenancy".to_string()
    } else {
        cleaned
    }
}

/// `INSTANCE,<M>_MIN,<M>_AVG,<M>_MAX,...` in metric definition order.
pub fn performance_header(metric_names: &[String]) -> Vec<String> {
    let mut header = Vec::with_capacity(1 + metric_names.len() * 3);
    header.push("INSTANCE".to_string());
    for name in metric_names {
        let upper = name.to_uppercase();
        for stat in ["MIN", "AVG", "MAX"] {
            header.push(format!("{}_{}", upper, stat));
        }
    }
    header
}

/// Inventory CSV. The header is written on creation, rows are flushed as they come.
pub struct InventoryCsv {
    writer: csv::Writer<File>,
    rows: usize,
}

impl InventoryCsv {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let mut writer =
            csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(INVENTORY_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn append(&mut self, record: &InventoryRecord) -> anyhow::Result<()> {
        self.writer.write_record(record.csv_record())?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Performance CSV, one row per instance whether or not any metric had data.
pub struct PerformanceCsv {
    writer: csv::Writer<File>,
    columns: usize,
    rows: usize,
}

impl PerformanceCsv {
    pub fn create(path: &Path, metric_names: &[String]) -> anyhow::Result<Self> {
        let mut writer =
            csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
        let header = performance_header(metric_names);
        writer.write_record(&header)?;
        Ok(Self {
            writer,
            columns: header.len(),
            rows: 0,
        })
    }

    pub fn append(&mut self, row: &ReportRow) -> anyhow::Result<()> {
        let record = row.performance_record();
        anyhow::ensure!(
            record.len() == self.columns,
            "performance row for {} has {} columns, header has {}",
            row.inventory.instance.id,
            record.len(),
            self.columns
        );
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}
