//! Off-screen staging area and block rasterisation.
//!
//! A [`StagingArea`] is the scoped workspace one export renders into: a
//! private temporary directory for the staged markup plus the font database
//! every block is rasterised against, and the [`TextMetrics`] that lay text
//! out with those same faces. It is created per export call and
//! removed when dropped, so a failure anywhere in the pipeline still leaves
//! nothing behind on disk.
//!
//! ## Readiness
//!
//! Font discovery is the slow part (a system scan can take a few hundred
//! milliseconds). [`StagingArea::open`] completes only once the database is
//! loaded, so awaiting it is the single readiness point before the first
//! block. After that, [`StagingArea::settle`] is the per-block pause between
//! staging markup and rasterising it.
//!
//! ## Why spawn_blocking?
//!
//! Parsing SVG, shaping text and filling a pixmap are CPU-bound and can take
//! tens of milliseconds for a large block. `tokio::task::spawn_blocking`
//! keeps that work off the async worker threads.

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::pipeline::flatten::SectionKind;
use crate::pipeline::markup::BlockMarkup;
use crate::pipeline::metrics::TextMetrics;
use image::RgbaImage;
use resvg::tiny_skia;
use resvg::usvg::{self, fontdb};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A block whose markup has been written into the staging area.
#[derive(Debug, Clone)]
pub struct StagedBlock {
    /// 0-based position in the flattened section list.
    pub index: usize,
    pub kind: SectionKind,
    /// Staged SVG file inside the staging directory.
    pub path: PathBuf,
    pub width_px: u32,
    pub height_px: u32,
}

impl StagedBlock {
    /// Pixel size the raster must have at `scale`.
    pub fn expected_size(&self, scale: f32) -> (u32, u32) {
        (scaled(self.width_px, scale), scaled(self.height_px, scale))
    }
}

/// A rasterised block, ready for composition.
#[derive(Debug, Clone)]
pub struct RasterBlock {
    pub index: usize,
    pub kind: SectionKind,
    /// Layout size of the markup; the raster is this times the raster scale.
    pub width_px: u32,
    pub height_px: u32,
    pub image: RgbaImage,
}

/// Turns a staged block into pixels.
///
/// Implementations run on the blocking pool. The default is
/// [`SvgRasterizer`]; tests plug in their own to count calls or inject
/// failures.
pub trait BlockRasterizer: Send + Sync {
    fn rasterize(
        &self,
        block: &StagedBlock,
        fonts: &Arc<fontdb::Database>,
        scale: f32,
    ) -> Result<RgbaImage, String>;
}

/// Rasterises staged SVG with resvg on a white background.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgRasterizer;

impl BlockRasterizer for SvgRasterizer {
    fn rasterize(
        &self,
        block: &StagedBlock,
        fonts: &Arc<fontdb::Database>,
        scale: f32,
    ) -> Result<RgbaImage, String> {
        let data = std::fs::read(&block.path)
            .map_err(|e| format!("cannot read staged markup {}: {e}", block.path.display()))?;

        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(fonts);
        let tree = usvg::Tree::from_data(&data, &opt).map_err(|e| format!("invalid SVG: {e}"))?;

        let (w, h) = block.expected_size(scale);
        let mut pixmap = tiny_skia::Pixmap::new(w, h)
            .ok_or_else(|| format!("cannot allocate {w}x{h} pixmap"))?;
        pixmap.fill(tiny_skia::Color::WHITE);
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        RgbaImage::from_raw(w, h, pixmap.take())
            .ok_or_else(|| "pixmap buffer has unexpected length".to_string())
    }
}

/// Scoped off-screen workspace for one export.
pub struct StagingArea {
    dir: TempDir,
    fonts: Arc<fontdb::Database>,
    metrics: TextMetrics,
    scale: f32,
    settle: Duration,
    rasterizer: Arc<dyn BlockRasterizer>,
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea")
            .field("dir", &self.dir.path())
            .field("fonts", &self.fonts.len())
            .field("scale", &self.scale)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl StagingArea {
    /// Create the staging directory and load fonts.
    ///
    /// Returns once the area is ready to rasterise.
    pub async fn open(config: &ExportConfig) -> Result<Self, ExportError> {
        let dir = match &config.staging_root {
            Some(root) => tempfile::Builder::new()
                .prefix("meetingmind-")
                .tempdir_in(root)
                .map_err(|source| ExportError::StagingFailed {
                    root: root.clone(),
                    source,
                })?,
            None => tempfile::Builder::new()
                .prefix("meetingmind-")
                .tempdir()
                .map_err(|source| ExportError::StagingFailed {
                    root: std::env::temp_dir(),
                    source,
                })?,
        };

        let font_dirs = config.font_dirs.clone();
        let system = config.load_system_fonts;
        let fonts = tokio::task::spawn_blocking(move || load_fonts(system, &font_dirs))
            .await
            .map_err(|e| ExportError::Internal(format!("Font loading task panicked: {}", e)))??;

        info!(
            "Staging area ready at {} ({} font faces)",
            dir.path().display(),
            fonts.len()
        );

        let fonts = Arc::new(fonts);
        Ok(Self {
            dir,
            metrics: TextMetrics::with_fonts(Arc::clone(&fonts), &config.style.font_family),
            fonts,
            scale: config.raster_scale,
            settle: Duration::from_millis(config.settle_delay_ms),
            rasterizer: config
                .rasterizer
                .clone()
                .unwrap_or_else(|| Arc::new(SvgRasterizer)),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Number of font faces available to the rasteriser.
    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    /// Text metrics over the rasteriser's fonts.
    pub fn metrics(&self) -> &TextMetrics {
        &self.metrics
    }

    /// Write a block's markup into the staging directory.
    pub async fn stage(&self, index: usize, markup: &BlockMarkup) -> Result<StagedBlock, ExportError> {
        let path = self
            .dir
            .path()
            .join(format!("block-{index:04}-{}.svg", markup.kind));
        tokio::fs::write(&path, markup.svg.as_bytes())
            .await
            .map_err(|e| ExportError::RenderFailed {
                block: index,
                kind: markup.kind,
                detail: format!("cannot stage markup: {e}"),
            })?;

        Ok(StagedBlock {
            index,
            kind: markup.kind,
            path,
            width_px: markup.width_px,
            height_px: markup.height_px,
        })
    }

    /// Wait for staged markup to settle before it is rasterised.
    pub async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }

    /// Rasterise a staged block and check its pixel size.
    pub async fn rasterize(&self, block: StagedBlock) -> Result<RasterBlock, ExportError> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let fonts = Arc::clone(&self.fonts);
        let scale = self.scale;
        let (index, kind) = (block.index, block.kind);

        let (block, result) = tokio::task::spawn_blocking(move || {
            let result = rasterizer.rasterize(&block, &fonts, scale);
            (block, result)
        })
        .await
        .map_err(|e| ExportError::Internal(format!("Raster task panicked: {}", e)))?;

        let image = result.map_err(|detail| ExportError::RenderFailed {
            block: index,
            kind,
            detail,
        })?;

        let (expected_w, expected_h) = block.expected_size(scale);
        if image.height() != expected_h {
            return Err(ExportError::HeightMismatch {
                block: index,
                expected: expected_h,
                actual: image.height(),
            });
        }
        if image.width() != expected_w {
            return Err(ExportError::RenderFailed {
                block: index,
                kind,
                detail: format!("raster is {}px wide, expected {}px", image.width(), expected_w),
            });
        }

        debug!(
            "Rasterised block {} ({}) → {}x{} px",
            index,
            kind,
            image.width(),
            image.height()
        );

        Ok(RasterBlock {
            index,
            kind,
            width_px: block.width_px,
            height_px: block.height_px,
            image,
        })
    }

    /// Remove the staging directory now, logging (not failing) on error.
    ///
    /// Dropping the area has the same effect silently.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove staging area {}: {}", path.display(), e);
        }
    }
}

/// Build the font database for one export: system fonts (optionally) plus
/// every configured directory.
pub(crate) fn load_fonts(system: bool, dirs: &[PathBuf]) -> Result<fontdb::Database, ExportError> {
    let mut db = fontdb::Database::new();
    if system {
        db.load_system_fonts();
    }
    for dir in dirs {
        if !dir.is_dir() {
            return Err(ExportError::FontsUnavailable { path: dir.clone() });
        }
        db.load_fonts_dir(dir);
    }
    if db.len() == 0 {
        warn!("No fonts loaded; text will not appear in rendered blocks");
    }
    Ok(db)
}

fn scaled(px: u32, scale: f32) -> u32 {
    ((px as f32) * scale).round().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::flatten::Section;
    use crate::pipeline::markup::render_markup;
    use crate::style::StyleSheet;

    fn config(root: &Path) -> ExportConfig {
        ExportConfig::builder()
            .staging_root(root)
            .load_system_fonts(false)
            .settle_delay_ms(0)
            .raster_scale(1.0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn footer_rasterises_to_declared_size() {
        let root = tempfile::tempdir().unwrap();
        let area = StagingArea::open(&config(root.path())).await.unwrap();
        let markup = render_markup(&Section::Footer, &StyleSheet::default(), area.metrics(), 720);

        let staged = area.stage(0, &markup).await.unwrap();
        assert!(staged.path.starts_with(area.path()));
        let raster = area.rasterize(staged).await.unwrap();

        assert_eq!(raster.image.width(), 720);
        assert_eq!(raster.image.height(), markup.height_px);
        assert_eq!(raster.kind, SectionKind::Footer);
    }

    #[tokio::test]
    async fn raster_scale_multiplies_pixels() {
        let root = tempfile::tempdir().unwrap();
        let cfg = ExportConfig::builder()
            .staging_root(root.path())
            .load_system_fonts(false)
            .settle_delay_ms(0)
            .raster_scale(2.0)
            .build()
            .unwrap();
        let area = StagingArea::open(&cfg).await.unwrap();
        let markup =
            render_markup(&Section::TopicsHeader, &StyleSheet::default(), area.metrics(), 720);
        let raster = area.rasterize(area.stage(1, &markup).await.unwrap()).await.unwrap();

        assert_eq!(raster.image.width(), 1440);
        assert_eq!(raster.image.height(), markup.height_px * 2);
        assert_eq!(raster.height_px, markup.height_px);
    }

    struct ShortRasterizer;

    impl BlockRasterizer for ShortRasterizer {
        fn rasterize(
            &self,
            block: &StagedBlock,
            _fonts: &Arc<fontdb::Database>,
            _scale: f32,
        ) -> Result<RgbaImage, String> {
            Ok(RgbaImage::new(block.width_px, block.height_px / 2))
        }
    }

    #[tokio::test]
    async fn wrong_height_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(root.path());
        cfg.rasterizer = Some(Arc::new(ShortRasterizer));
        let area = StagingArea::open(&cfg).await.unwrap();
        let markup = render_markup(&Section::Footer, &StyleSheet::default(), area.metrics(), 720);
        let err = area
            .rasterize(area.stage(5, &markup).await.unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::HeightMismatch { block: 5, .. }));
    }

    fn bundled_fonts() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fonts")
    }

    /// Dark pixels: the card text colours, not its fills or accent bar.
    fn dark_columns(image: &RgbaImage) -> Vec<u32> {
        image
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] < 150 && p[1] < 150 && p[2] < 150)
            .map(|(x, _, _)| x)
            .collect()
    }

    #[tokio::test]
    async fn drawn_text_stays_inside_the_card() {
        let root = tempfile::tempdir().unwrap();
        let cfg = ExportConfig::builder()
            .staging_root(root.path())
            .load_system_fonts(false)
            .font_dir(bundled_fonts())
            .settle_delay_ms(0)
            .raster_scale(1.0)
            .build()
            .unwrap();
        let area = StagingArea::open(&cfg).await.unwrap();
        assert!(area.metrics().uses_fonts());

        let section = Section::Decision {
            decision: crate::report::Decision {
                decision: format!("{} {}", "WWWW mmmm ".repeat(12), "W".repeat(90)),
                rationale: "예산 회의 결과 ✅ — ".repeat(20),
                impact: "nnnnnnnnnn MMMMMMMM %%%% @@@@ ".repeat(8),
                deadline: Some("2024-12-20".into()),
            },
        };
        let markup = render_markup(&section, &cfg.style, area.metrics(), 720);
        let raster = area.rasterize(area.stage(0, &markup).await.unwrap()).await.unwrap();

        // Wrapper padding plus card padding on the right.
        let content_right = 720.0 - cfg.style.wrapper_padding - cfg.style.card_padding;
        let columns = dark_columns(&raster.image);
        assert!(columns.len() > 1000, "no text was drawn");
        let rightmost = columns.into_iter().max().unwrap();
        assert!(
            (rightmost as f32) < content_right + 2.0,
            "text reaches x={rightmost}, column ends at {content_right}"
        );
    }

    #[tokio::test]
    async fn missing_font_dir_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(root.path());
        cfg.font_dirs = vec![root.path().join("no-such-fonts")];
        let err = StagingArea::open(&cfg).await.unwrap_err();
        assert!(matches!(err, ExportError::FontsUnavailable { .. }));
    }

    #[test]
    fn staging_directory_is_removed_on_close_and_drop() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(root.path());

        let area = tokio_test::block_on(StagingArea::open(&cfg)).unwrap();
        let staged = area.path().to_path_buf();
        assert!(staged.is_dir());
        area.close();
        assert!(!staged.exists());

        let area = tokio_test::block_on(StagingArea::open(&cfg)).unwrap();
        let staged = area.path().to_path_buf();
        drop(area);
        assert!(!staged.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
