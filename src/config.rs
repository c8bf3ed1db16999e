//! Configuration types for report export and summarisation.
//!
//! Export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]; the summarisation collaborator has its own
//! [`SummarizeConfig`]. Keeping every knob in one struct makes it trivial
//! to share a config across concurrent exports and to log exactly what a
//! run used.

use crate::error::ExportError;
use crate::pipeline::compose::{LayoutStrategy, PageGeometry, PaperSize};
use crate::pipeline::stage::BlockRasterizer;
use crate::progress::ProgressCallback;
use crate::style::StyleSheet;
use chrono::NaiveDate;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration for one report export.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use meetingmind::{ExportConfig, PaperSize};
///
/// let config = ExportConfig::builder()
///     .paper(PaperSize::Letter)
///     .margin_mm(12.0)
///     .raster_scale(3.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Page size. Default: A4 portrait (210 × 297 mm).
    pub paper: PaperSize,

    /// Margin on all four sides, in millimetres. Default: 10.
    pub margin_mm: f32,

    /// Vertical gap between consecutive blocks on a page, in mm. Default: 3.
    pub block_gap_mm: f32,

    /// Layout width every block is rendered at, in CSS pixels. Default: 720.
    ///
    /// All blocks share this width, so every block scales to the printable
    /// width by the same factor and text size stays uniform across pages.
    pub render_width_px: u32,

    /// Device-pixel multiplier for rasterisation. Range: 1–4. Default: 2.
    ///
    /// 2× keeps small text crisp when printed; 3–4× is for print shops.
    /// Memory per block grows with the square of this value.
    pub raster_scale: f32,

    /// Pause between staging a block and rasterising it, in ms. Default: 100.
    ///
    /// Tests set this to 0.
    pub settle_delay_ms: u64,

    /// Extra font directories loaded into the staging area. Every entry must exist.
    pub font_dirs: Vec<PathBuf>,

    /// Also load fonts installed on the system. Default: true.
    pub load_system_fonts: bool,

    /// Where the per-export staging directory is created. Default: the OS temp dir.
    pub staging_root: Option<PathBuf>,

    /// How blocks are laid out onto pages. Default: [`LayoutStrategy::Paginated`].
    pub layout: LayoutStrategy,

    /// Visual style shared by every block.
    pub style: StyleSheet,

    /// File name prefix of generated artifacts. Default: `meeting-report`.
    pub file_label: String,

    /// Date stamped into artifact names. If None, today's local date.
    pub export_date: Option<NaiveDate>,

    /// Custom block rasteriser. If None, uses the built-in SVG rasteriser.
    pub rasterizer: Option<Arc<dyn BlockRasterizer>>,

    /// Receives per-block progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Checked between blocks; raising it aborts the export.
    pub cancel: Option<CancelFlag>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            paper: PaperSize::default(),
            margin_mm: 10.0,
            block_gap_mm: 3.0,
            render_width_px: 720,
            raster_scale: 2.0,
            settle_delay_ms: 100,
            font_dirs: Vec::new(),
            load_system_fonts: true,
            staging_root: None,
            layout: LayoutStrategy::default(),
            style: StyleSheet::default(),
            file_label: "meeting-report".to_string(),
            export_date: None,
            rasterizer: None,
            progress_callback: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("paper", &self.paper)
            .field("margin_mm", &self.margin_mm)
            .field("block_gap_mm", &self.block_gap_mm)
            .field("render_width_px", &self.render_width_px)
            .field("raster_scale", &self.raster_scale)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("font_dirs", &self.font_dirs)
            .field("load_system_fonts", &self.load_system_fonts)
            .field("staging_root", &self.staging_root)
            .field("layout", &self.layout)
            .field("file_label", &self.file_label)
            .field("export_date", &self.export_date)
            .field(
                "rasterizer",
                &self.rasterizer.as_ref().map(|_| "<dyn BlockRasterizer>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page geometry derived from paper size, margin and gap.
    pub fn geometry(&self) -> PageGeometry {
        let (width_mm, height_mm) = self.paper.dimensions_mm();
        PageGeometry {
            width_mm,
            height_mm,
            margin_mm: self.margin_mm,
            block_gap_mm: self.block_gap_mm,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// Builder for [`ExportConfig`].
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl fmt::Debug for ExportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExportConfigBuilder {
    pub fn paper(mut self, paper: PaperSize) -> Self {
        self.config.paper = paper;
        self
    }

    pub fn margin_mm(mut self, mm: f32) -> Self {
        self.config.margin_mm = mm.max(0.0);
        self
    }

    pub fn block_gap_mm(mut self, mm: f32) -> Self {
        self.config.block_gap_mm = mm.max(0.0);
        self
    }

    pub fn render_width_px(mut self, px: u32) -> Self {
        self.config.render_width_px = px.clamp(240, 2400);
        self
    }

    pub fn raster_scale(mut self, scale: f32) -> Self {
        self.config.raster_scale = scale.clamp(1.0, 4.0);
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.font_dirs.push(dir.into());
        self
    }

    pub fn load_system_fonts(mut self, v: bool) -> Self {
        self.config.load_system_fonts = v;
        self
    }

    pub fn staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.staging_root = Some(root.into());
        self
    }

    pub fn layout(mut self, layout: LayoutStrategy) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn style(mut self, style: StyleSheet) -> Self {
        self.config.style = style;
        self
    }

    pub fn file_label(mut self, label: impl Into<String>) -> Self {
        self.config.file_label = label.into();
        self
    }

    pub fn export_date(mut self, date: NaiveDate) -> Self {
        self.config.export_date = Some(date);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn BlockRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel(mut self, flag: CancelFlag) -> Self {
        self.config.cancel = Some(flag);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        let (w, h) = c.paper.dimensions_mm();
        if !(w > 0.0 && h > 0.0) {
            return Err(ExportError::InvalidConfig(format!(
                "Paper size must be positive, got {}×{} mm",
                w, h
            )));
        }
        if 2.0 * c.margin_mm >= w.min(h) {
            return Err(ExportError::InvalidConfig(format!(
                "Margin of {} mm leaves no printable area on a {}×{} mm page",
                c.margin_mm, w, h
            )));
        }
        if c.file_label.trim().is_empty() {
            return Err(ExportError::InvalidConfig(
                "File label must not be empty".into(),
            ));
        }
        if c.file_label.contains(['/', '\\']) {
            return Err(ExportError::InvalidConfig(format!(
                "File label must not contain path separators, got '{}'",
                c.file_label
            )));
        }
        Ok(self.config)
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared flag a caller raises to stop an export between blocks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Summarisation ────────────────────────────────────────────────────────

/// Configuration for the summarisation collaborator.
#[derive(Clone)]
pub struct SummarizeConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens of the reply. Default: 8192.
    ///
    /// A long meeting with many follow-ups easily needs 3 000+ tokens of
    /// JSON; a truncated reply is unparseable.
    pub max_tokens: usize,

    /// Timeout of the single LLM call, in seconds. Default: 180.
    pub timeout_secs: u64,

    /// Custom system prompt. If None, uses built-in default.
    pub system_prompt: Option<String>,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 8192,
            timeout_secs: 180,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for SummarizeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizeConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

impl SummarizeConfig {
    pub fn builder() -> SummarizeConfigBuilder {
        SummarizeConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SummarizeConfig`].
#[derive(Debug)]
pub struct SummarizeConfigBuilder {
    config: SummarizeConfig,
}

impl SummarizeConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(256);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> SummarizeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a4_layout() {
        let c = ExportConfig::default();
        let g = c.geometry();
        assert_eq!((g.width_mm, g.height_mm), (210.0, 297.0));
        assert_eq!(g.margin_mm, 10.0);
        assert_eq!(g.block_gap_mm, 3.0);
        assert_eq!(c.settle_delay_ms, 100);
        assert_eq!(c.file_label, "meeting-report");
    }

    #[test]
    fn builder_clamps_scale() {
        let c = ExportConfig::builder().raster_scale(9.0).build().unwrap();
        assert_eq!(c.raster_scale, 4.0);
        let c = ExportConfig::builder().raster_scale(0.1).build().unwrap();
        assert_eq!(c.raster_scale, 1.0);
    }

    #[test]
    fn oversized_margin_is_rejected() {
        let err = ExportConfig::builder().margin_mm(120.0).build().unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfig(_)));
    }

    #[test]
    fn label_with_separator_is_rejected() {
        assert!(ExportConfig::builder().file_label("a/b").build().is_err());
        assert!(ExportConfig::builder().file_label("  ").build().is_err());
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let config = ExportConfig::builder().cancel(flag.clone()).build().unwrap();
        assert!(!config.is_cancelled());
        flag.cancel();
        assert!(config.is_cancelled());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", SummarizeConfig::default());
        assert!(s.contains("provider: None"));
        let s = format!("{:?}", ExportConfig::default());
        assert!(s.contains("rasterizer: None"));
    }
}
