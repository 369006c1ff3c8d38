// Zip bundle of the run's CSV and PDF artifacts, then cleanup of the work directory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use tracing::info;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Deflates every file under `dir` into `archive`, with names relative to `dir`.
/// Returns the number of files added.
pub fn zip_dir(dir: &Path, archive: &Path) -> anyhow::Result<usize> {
    if let Some(parent) = archive.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(archive).with_context(|| format!("creating {}", archive.display()))?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut added = 0;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir)?;
        let name = relative.to_string_lossy().replace('\\', "/");
        zip.start_file(name, options)?;
        let bytes = std::fs::read(entry.path())
            .with_context(|| format!("reading {}", entry.path().display()))?;
        zip.write_all(&bytes)?;
        added += 1;
    }
    let mut out = zip.finish()?;
    out.flush()?;
    info!(archive = %archive.display(), files = added, "report archive written");
    Ok(added)
}

/// Zips `dir` into `archive` and removes `dir`.
pub fn archive_and_clean(dir: &Path, archive: &Path) -> anyhow::Result<usize> {
    let added = zip_dir(dir, archive)?;
    std::fs::remove_dir_all(dir).with_context(|| format!("removing {}", dir.display()))?;
    Ok(added)
}

/// Empties (or creates) a run's work directory.
pub fn prepare_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).with_context(|| format!("clearing {}", dir.display()))?;
    }
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(())
}
