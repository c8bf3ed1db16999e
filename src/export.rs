//! PDF export entry points.
//!
//! One call owns everything it touches: the flattened sections, a scoped
//! staging area, the compositor and the rasters. Blocks are processed
//! strictly in order, because the compositor's page-break decision for a
//! block depends on where the previous block ended.
//!
//! Any failure ends the call. There is no partial document: the staging
//! directory is removed, nothing is serialised and no file is written.

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::output::{ExportOutput, ExportStats};
use crate::pipeline::compose::{Compositor, Document};
use crate::pipeline::flatten::{flatten, Section};
use crate::pipeline::markup::render_markup;
use crate::pipeline::metrics::TextMetrics;
use crate::pipeline::serialize::serialize_pdf;
use crate::pipeline::stage::{load_fonts, RasterBlock, StagingArea};
use crate::report::Report;
use chrono::NaiveDate;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Export a report as a paginated PDF.
///
/// # Errors
/// Returns the first failure; see [`ExportError`]. No bytes are produced
/// on error.
pub async fn export_pdf(report: &Report, config: &ExportConfig) -> Result<ExportOutput, ExportError> {
    let total_start = Instant::now();
    let sections = flatten(report);
    let total = sections.len();
    info!(
        "Starting PDF export of '{}': {} blocks, {} layout",
        report.title, total, config.layout
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_start(total);
    }

    // ── Step 1: Staging area (readiness point) ───────────────────────────
    let staging = StagingArea::open(config).await?;
    let font_faces = staging.font_count();

    // ── Step 2: Render and place every block ─────────────────────────────
    let render_start = Instant::now();
    let composed = render_and_compose(&sections, &staging, config).await;
    staging.close();
    let (document, rasters) = composed?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // ── Step 3: Serialise ────────────────────────────────────────────────
    let serialize_start = Instant::now();
    let title = report.title.clone();
    let (document, bytes) = tokio::task::spawn_blocking(move || {
        let bytes = serialize_pdf(&document, &rasters, &title);
        (document, bytes)
    })
    .await
    .map_err(|e| ExportError::Internal(format!("Serialisation task panicked: {}", e)))?;
    let bytes = bytes?;
    let serialize_duration_ms = serialize_start.elapsed().as_millis() as u64;

    let stats = ExportStats {
        total_blocks: total,
        total_pages: document.page_count(),
        overflowing_blocks: document.placements().filter(|p| p.overflows).count(),
        font_faces,
        output_bytes: bytes.len(),
        render_duration_ms,
        serialize_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Export complete: {} blocks on {} pages, {} bytes, {}ms total",
        stats.total_blocks, stats.total_pages, stats.output_bytes, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(stats.total_blocks, stats.total_pages);
    }

    Ok(ExportOutput {
        bytes,
        file_name: artifact_file_name(&config.file_label, export_date(config), "pdf"),
        layout: document,
        stats,
    })
}

/// Export a report and write the PDF to `output_path`.
///
/// If `output_path` is an existing directory the generated file name is
/// used inside it. Uses atomic write (temp file + rename) to prevent
/// partial files.
pub async fn export_pdf_to_file(
    report: &Report,
    output_path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<(PathBuf, ExportOutput), ExportError> {
    let output = export_pdf(report, config).await?;
    let path = write_artifact(output_path.as_ref(), &output.file_name, &output.bytes).await?;
    Ok((path, output))
}

/// Synchronous wrapper around [`export_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_pdf_sync(report: &Report, config: &ExportConfig) -> Result<ExportOutput, ExportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export_pdf(report, config))
}

/// Compute the page layout of a report without rasterising anything.
///
/// Block heights come from the markup, which the rasteriser is required to
/// reproduce exactly. Text is measured against the same fonts an export
/// loads, so this is the layout [`export_pdf`] will produce.
///
/// # Errors
/// [`ExportError::FontsUnavailable`] if a configured font directory is missing.
pub fn plan_layout(
    report: &Report,
    config: &ExportConfig,
) -> Result<(Vec<Section>, Document), ExportError> {
    let fonts = load_fonts(config.load_system_fonts, &config.font_dirs)?;
    let metrics = TextMetrics::with_fonts(Arc::new(fonts), &config.style.font_family);

    let sections = flatten(report);
    let mut compositor = Compositor::new(config.geometry(), config.layout);
    for (index, section) in sections.iter().enumerate() {
        let markup = render_markup(section, &config.style, &metrics, config.render_width_px);
        compositor.place(index, markup.kind, markup.width_px, markup.height_px);
    }
    Ok((sections, compositor.finish()))
}

/// `<label>-<YYYY-MM-DD>.<ext>`
pub fn artifact_file_name(label: &str, date: NaiveDate, ext: &str) -> String {
    format!("{}-{}.{}", label, date.format("%Y-%m-%d"), ext)
}

/// The date stamped into artifact names.
pub(crate) fn export_date(config: &ExportConfig) -> NaiveDate {
    config
        .export_date
        .unwrap_or_else(|| chrono::Local::now().date_naive())
}

/// Write `bytes` to `path` (or `path/file_name` when `path` is a directory).
pub(crate) async fn write_artifact(
    path: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<PathBuf, ExportError> {
    let path = if tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        path.join(file_name)
    } else {
        path.to_path_buf()
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ExportError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
    }

    let mut tmp: OsString = path.clone().into_os_string();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| ExportError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(ExportError::OutputWriteFailed { path, source: e });
    }

    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Render, rasterise and place every section in order.
async fn render_and_compose(
    sections: &[Section],
    staging: &StagingArea,
    config: &ExportConfig,
) -> Result<(Document, Vec<RasterBlock>), ExportError> {
    let total = sections.len();
    let mut compositor = Compositor::new(config.geometry(), config.layout);
    let mut rasters = Vec::with_capacity(total);

    for (index, section) in sections.iter().enumerate() {
        if config.is_cancelled() {
            info!("Export cancelled after {}/{} blocks", index, total);
            return Err(ExportError::Cancelled {
                completed: index,
                total,
            });
        }

        let kind = section.kind();
        if let Some(ref cb) = config.progress_callback {
            cb.on_block_start(index + 1, total, kind);
        }

        let raster = match render_block(index, section, staging, config).await {
            Ok(raster) => raster,
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_block_error(index + 1, total, &e.to_string());
                }
                return Err(e);
            }
        };

        let pages_before = compositor.page_count();
        let placed = compositor.place(index, kind, raster.width_px, raster.height_px);
        let page = placed.first().map_or(0, |p| p.page);
        debug!(
            "Block {}/{} ({}) → page {}, y={:.1}mm",
            index + 1,
            total,
            kind,
            page + 1,
            placed.first().map_or(0.0, |p| p.y_mm)
        );

        if let Some(ref cb) = config.progress_callback {
            for opened in pages_before..compositor.page_count() {
                cb.on_page_opened(opened + 1);
            }
            cb.on_block_complete(index + 1, total, page + 1);
        }
        rasters.push(raster);
    }

    Ok((compositor.finish(), rasters))
}

async fn render_block(
    index: usize,
    section: &Section,
    staging: &StagingArea,
    config: &ExportConfig,
) -> Result<RasterBlock, ExportError> {
    let markup = render_markup(section, &config.style, staging.metrics(), config.render_width_px);
    let staged = staging.stage(index, &markup).await?;
    staging.settle().await;
    staging.rasterize(staged).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_label_dash_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 16).unwrap();
        assert_eq!(
            artifact_file_name("meeting-report", date, "pdf"),
            "meeting-report-2024-12-16.pdf"
        );
        assert_eq!(artifact_file_name("q4", date, "docx"), "q4-2024-12-16.docx");
    }

    #[test]
    fn pinned_export_date_wins() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let config = ExportConfig::builder().export_date(date).build().unwrap();
        assert_eq!(export_date(&config), date);
    }

    #[tokio::test]
    async fn artifact_lands_inside_directory_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(dir.path(), "r-2024-12-16.pdf", b"%PDF-1.3")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("r-2024-12-16.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.3");

        let explicit = dir.path().join("nested").join("out.pdf");
        let path = write_artifact(&explicit, "ignored.pdf", b"x").await.unwrap();
        assert_eq!(path, explicit);
        // No temp file left behind.
        let names: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("out.pdf")]);
    }
}
