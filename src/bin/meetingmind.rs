//! CLI binary for meetingmind.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExportConfig` / `SummarizeConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use meetingmind::{
    export_docx_to_file, export_pdf_to_file, plan_layout, summarize, ExportConfig,
    ExportProgressCallback, LayoutStrategy, MeetingMaterials, PaperSize, ProgressCallback, Report,
    SectionKind, StyleSheet, SummarizeConfig,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One progress bar per exported report, stacked in a shared `MultiProgress`.
struct CliProgressCallback {
    bar: ProgressBar,
    name: String,
    pages: AtomicUsize,
}

impl CliProgressCallback {
    fn new(multi: &MultiProgress, name: &str) -> Arc<Self> {
        let bar = multi.add(ProgressBar::new(0));
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix(name.to_string());
        bar.set_message("Loading fonts…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            name: name.to_string(),
            pages: AtomicUsize::new(0),
        })
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, total_blocks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:36.green/238}] {pos:>3}/{len} blocks  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_blocks as u64);
        self.bar.set_style(style);
    }

    fn on_block_start(&self, _block_num: usize, _total: usize, kind: SectionKind) {
        let page = self.pages.load(Ordering::SeqCst).max(1);
        self.bar.set_message(format!("{kind}  {}", dim(&format!("page {page}"))));
    }

    fn on_page_opened(&self, page_num: usize) {
        self.pages.store(page_num, Ordering::SeqCst);
    }

    fn on_block_complete(&self, _block_num: usize, _total: usize, _page_num: usize) {
        self.bar.inc(1);
    }

    fn on_block_error(&self, block_num: usize, total: usize, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {} block {}/{}  {}",
            red("✗"),
            self.name,
            block_num,
            total,
            red(&msg)
        ));
    }

    fn on_export_complete(&self, total_blocks: usize, total_pages: usize) {
        self.bar.finish_with_message(format!(
            "{} {} blocks on {} pages",
            green("✓"),
            total_blocks,
            total_pages
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export a report to ./meeting-report-<today>.pdf
  meetingmind export report.json

  # PDF and DOCX into a directory, US Letter
  meetingmind export report.json --format all --paper letter -o out/

  # Several reports, four at a time
  meetingmind export reports/*.json --concurrency 4 -o out/

  # Show where each block lands without rendering
  meetingmind outline report.json

  # Summarise meeting material into a report
  meetingmind summarize --material agenda.txt --transcript call.txt -o report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            OpenAI API key
  ANTHROPIC_API_KEY         Anthropic API key
  GEMINI_API_KEY            Google Gemini API key
  MEETINGMIND_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  MEETINGMIND_MODEL         Override model ID
  RUST_LOG                  Log filter, e.g. meetingmind=debug
"#;

/// Turn meeting reports into paginated PDF and DOCX documents.
#[derive(Parser, Debug)]
#[command(
    name = "meetingmind",
    version,
    about = "Turn meeting reports into paginated PDF and DOCX documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MEETINGMIND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MEETINGMIND_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export report JSON files as PDF and/or DOCX.
    Export(ExportArgs),
    /// Summarise meeting material into report JSON with an LLM.
    Summarize(SummarizeArgs),
    /// Print the block sequence and page layout of a report.
    Outline(OutlineArgs),
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Paper size: a4, letter, or WxH in millimetres.
    #[arg(long, env = "MEETINGMIND_PAPER", default_value = "a4")]
    paper: PaperSize,

    /// Page margin on all sides, in millimetres.
    #[arg(long, env = "MEETINGMIND_MARGIN_MM", default_value_t = 10.0)]
    margin_mm: f32,

    /// Vertical gap between blocks, in millimetres.
    #[arg(long, env = "MEETINGMIND_GAP_MM", default_value_t = 3.0)]
    gap_mm: f32,

    /// Layout: paginated (blocks never split) or single-canvas.
    #[arg(long, env = "MEETINGMIND_LAYOUT", default_value = "paginated")]
    layout: LayoutStrategy,

    /// JSON file overriding the default style sheet.
    #[arg(long, env = "MEETINGMIND_STYLE")]
    style: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Report JSON files.
    #[arg(required = true)]
    reports: Vec<PathBuf>,

    /// Output directory or, for a single report and format, file path.
    #[arg(short, long, env = "MEETINGMIND_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Artifact format.
    #[arg(long, env = "MEETINGMIND_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Raster scale (1–4); higher is sharper and larger.
    #[arg(long, env = "MEETINGMIND_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Pause between staging and rasterising each block, in milliseconds.
    #[arg(long, env = "MEETINGMIND_SETTLE_MS", default_value_t = 100)]
    settle_ms: u64,

    /// Extra font directory (repeatable).
    #[arg(long = "font-dir", env = "MEETINGMIND_FONT_DIR")]
    font_dirs: Vec<PathBuf>,

    /// Do not load system fonts.
    #[arg(long)]
    no_system_fonts: bool,

    /// File name prefix; the export date is appended.
    #[arg(long, env = "MEETINGMIND_LABEL", default_value = "meeting-report")]
    label: String,

    /// Number of reports exported at the same time.
    #[arg(short, long, env = "MEETINGMIND_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Print a JSON summary per artifact instead of log lines.
    #[arg(long)]
    json: bool,

    /// Disable progress bars.
    #[arg(long, env = "MEETINGMIND_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// Meeting material text file (repeatable).
    #[arg(long = "material")]
    materials: Vec<PathBuf>,

    /// Transcript text file.
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Write report JSON to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "MEETINGMIND_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID.
    #[arg(long, env = "MEETINGMIND_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, default_value_t = 0.2)]
    temperature: f32,

    /// Max output tokens.
    #[arg(long, default_value_t = 8192)]
    max_tokens: usize,

    /// LLM call timeout in seconds.
    #[arg(long, default_value_t = 180)]
    timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long)]
    system_prompt: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OutlineArgs {
    /// Report JSON file.
    report: PathBuf,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Print the layout as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Pdf,
    Docx,
    All,
}

impl FormatArg {
    fn pdf(self) -> bool {
        matches!(self, FormatArg::Pdf | FormatArg::All)
    }

    fn docx(self) -> bool {
        matches!(self, FormatArg::Docx | FormatArg::All)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Progress bars replace INFO logs for exports unless --verbose is given.
    let bars = match &cli.command {
        Command::Export(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bars {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Export(ref args) => run_export(args, cli.quiet, bars).await,
        Command::Summarize(ref args) => run_summarize(args, cli.quiet).await,
        Command::Outline(ref args) => run_outline(args).await,
    }
}

// ── export ───────────────────────────────────────────────────────────────────

async fn run_export(args: &ExportArgs, quiet: bool, bars: bool) -> Result<()> {
    let base = build_export_config(args).await?;
    let multi = MultiProgress::new();
    if !bars {
        multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    // A single artifact may be written to an explicit file path; several go in a directory.
    let many = args.reports.len() > 1 || args.format == FormatArg::All;
    if many {
        ensure_output_dir(&args.output)?;
        tokio::fs::create_dir_all(&args.output)
            .await
            .with_context(|| format!("Failed to create {}", args.output.display()))?;
    }
    let results: Vec<Result<Vec<PathBuf>>> = stream::iter(args.reports.iter().map(|path| {
        let mut config = base.clone();
        let multi = &multi;
        async move {
            let report = load_report(path).await?;
            if args.reports.len() > 1 {
                config.file_label = format!("{}-{}", config.file_label, file_stem(path));
            }
            if bars {
                let cb = CliProgressCallback::new(multi, &file_stem(path));
                config.progress_callback = Some(cb as ProgressCallback);
            }
            let target = args.output.as_path();

            let mut written = Vec::new();
            if args.format.pdf() {
                let (out_path, output) = export_pdf_to_file(&report, target, &config)
                    .await
                    .with_context(|| format!("PDF export of {} failed", path.display()))?;
                if args.json {
                    println!(
                        "{}",
                        serde_json::to_string(&output.summary())
                            .context("Failed to serialise export summary")?
                    );
                } else if !quiet {
                    multi.suspend(|| {
                        eprintln!(
                            "{}  {} blocks, {} pages{}  →  {}",
                            green("✔"),
                            output.stats.total_blocks,
                            output.stats.total_pages,
                            if output.stats.overflowing_blocks > 0 {
                                yellow(&format!(
                                    "  ({} oversized)",
                                    output.stats.overflowing_blocks
                                ))
                            } else {
                                String::new()
                            },
                            bold(&out_path.display().to_string()),
                        )
                    });
                }
                written.push(out_path);
            }
            if args.format.docx() {
                let (out_path, output) = export_docx_to_file(&report, target, &config)
                    .await
                    .with_context(|| format!("DOCX export of {} failed", path.display()))?;
                if !quiet && !args.json {
                    multi.suspend(|| {
                        eprintln!(
                            "{}  {} sections  →  {}",
                            green("✔"),
                            output.sections,
                            bold(&out_path.display().to_string())
                        )
                    });
                }
                written.push(out_path);
            }
            Ok(written)
        }
    }))
    .buffer_unordered(args.concurrency.max(1))
    .collect()
    .await;

    let total = results.len();
    let mut failed = 0;
    for result in results {
        if let Err(e) = result {
            failed += 1;
            eprintln!("{} {:#}", red("✘"), e);
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {total} report exports failed");
    }
    if !quiet && !args.json && total > 1 {
        eprintln!("{}", dim(&format!("{total} reports exported")));
    }
    Ok(())
}

/// Map CLI args to `ExportConfig`.
async fn build_export_config(args: &ExportArgs) -> Result<ExportConfig> {
    let mut builder = layout_builder(&args.layout)
        .await?
        .raster_scale(args.scale)
        .settle_delay_ms(args.settle_ms)
        .load_system_fonts(!args.no_system_fonts)
        .file_label(&args.label);
    for dir in &args.font_dirs {
        builder = builder.font_dir(dir);
    }
    builder.build().context("Invalid configuration")
}

/// Builder with paper, margins, layout and style applied.
async fn layout_builder(args: &LayoutArgs) -> Result<meetingmind::ExportConfigBuilder> {
    let mut builder = ExportConfig::builder()
        .paper(args.paper)
        .margin_mm(args.margin_mm)
        .block_gap_mm(args.gap_mm)
        .layout(args.layout);
    if let Some(ref path) = args.style {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read style sheet {}", path.display()))?;
        let style: StyleSheet = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid style sheet {}", path.display()))?;
        builder = builder.style(style);
    }
    Ok(builder)
}

/// Reject an `-o` that names a file when several artifacts will be written.
fn ensure_output_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        anyhow::bail!(
            "{} is a file; several artifacts need an output directory",
            path.display()
        );
    }
    let artifact_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf") || e.eq_ignore_ascii_case("docx"));
    if artifact_ext {
        anyhow::bail!(
            "{} looks like a file name; with several reports or --format all, pass a directory to -o",
            path.display()
        );
    }
    Ok(())
}

async fn load_report(path: &Path) -> Result<Report> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a valid report", path.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string())
}

// ── summarize ────────────────────────────────────────────────────────────────

async fn run_summarize(args: &SummarizeArgs, quiet: bool) -> Result<()> {
    let input = MeetingMaterials::from_files(&args.materials, args.transcript.as_deref())
        .await
        .context("Failed to read meeting input")?;

    let mut builder = SummarizeConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .timeout_secs(args.timeout);
    if let Some(ref p) = args.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref m) = args.model {
        builder = builder.model(m);
    }
    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_message("Summarising…");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    };
    let report = summarize(&input, &builder.build()).await;
    spinner.finish_and_clear();
    let report = report.context("Summarisation failed")?;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
    match args.output {
        Some(ref path) => {
            tokio::fs::write(path, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{}  '{}'  →  {}",
                    green("✔"),
                    report.title,
                    bold(&path.display().to_string())
                );
            }
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── outline ──────────────────────────────────────────────────────────────────

async fn run_outline(args: &OutlineArgs) -> Result<()> {
    let report = load_report(&args.report).await?;
    let config = layout_builder(&args.layout)
        .await?
        .build()
        .context("Invalid configuration")?;
    let (sections, document) = plan_layout(&report, &config).context("Layout planning failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&document).context("Failed to serialise layout")?
        );
        return Ok(());
    }

    println!(
        "{}",
        bold(&format!(
            "{} blocks, {} pages ({})",
            sections.len(),
            document.page_count(),
            document.layout
        ))
    );
    for p in document.placements() {
        let flag = if p.overflows {
            yellow("  oversized")
        } else if p.slice.is_some() {
            dim("  sliced")
        } else {
            String::new()
        };
        println!(
            "  {:>3}  {:<18} page {:>2}  y {:>6.1} mm  h {:>6.1} mm{}",
            p.block + 1,
            p.kind.to_string(),
            p.page + 1,
            p.y_mm,
            p.height_mm,
            flag
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_like_output_is_rejected_for_several_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_output_dir(dir.path()).is_ok());
        assert!(ensure_output_dir(&dir.path().join("reports")).is_ok());
        assert!(ensure_output_dir(&dir.path().join("out.pdf")).is_err());
        assert!(ensure_output_dir(&dir.path().join("Out.DOCX")).is_err());

        let file = dir.path().join("notes");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_output_dir(&file).is_err());
        assert!(!dir.path().join("out.pdf").exists());
    }
}
