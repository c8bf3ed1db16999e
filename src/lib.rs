//! # meetingmind
//!
//! Turn structured meeting reports into paginated PDF and DOCX documents.
//!
//! ## Why render blocks separately?
//!
//! A report is a long vertical stack of cards: topics, decisions, risks and
//! follow-ups. Printing it as one tall image and cutting that into pages
//! slices cards in half at every page boundary. Instead, the report is
//! flattened into blocks, each block is rendered on its own at a fixed
//! width, and a compositor moves any block that does not fit to the next
//! page. A card is never cut.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Report (JSON)
//!  │
//!  ├─ 1. Flatten   ordered sections, one per card
//!  ├─ 2. Markup    fixed-width SVG per section, exact height
//!  ├─ 3. Stage     scoped temp dir + fonts; rasterise (spawn_blocking)
//!  ├─ 4. Compose   page-break state machine
//!  └─ 5. Serialise printpdf → meeting-report-YYYY-MM-DD.pdf
//! ```
//!
//! The DOCX exporter ([`export_docx`]) walks the same flattened sections and
//! lets the word processor paginate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meetingmind::{export_pdf, ExportConfig, Report};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report: Report = serde_json::from_str(&std::fs::read_to_string("report.json")?)?;
//!     let output = export_pdf(&report, &ExportConfig::default()).await?;
//!     std::fs::write(&output.file_name, &output.bytes)?;
//!     eprintln!("{} pages", output.stats.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! Reports can also be produced from meeting material with [`summarize()`],
//! which asks an LLM (any `edgequake-llm` provider) for the report JSON.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `meetingmind` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! meetingmind = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod flow;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod style;
pub mod summarize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CancelFlag, ExportConfig, ExportConfigBuilder, SummarizeConfig, SummarizeConfigBuilder,
};
pub use error::{ExportError, SummarizeError};
pub use export::{artifact_file_name, export_pdf, export_pdf_sync, export_pdf_to_file, plan_layout};
pub use flow::{export_docx, export_docx_to_file};
pub use output::{ExportOutput, ExportStats, FlowOutput};
pub use pipeline::compose::{
    Compositor, Cursor, Document, LayoutStrategy, Page, PageGeometry, PaperSize, Placement,
};
pub use pipeline::flatten::{flatten, Section, SectionKind};
pub use pipeline::metrics::TextMetrics;
pub use pipeline::stage::{BlockRasterizer, RasterBlock, StagedBlock, SvgRasterizer};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{
    parse_report_response, Decision, FollowUp, Report, ReportParseError, Risk, Tier, Topic,
};
pub use style::StyleSheet;
pub use summarize::{summarize, Material, MeetingMaterials};

/// Font database type used by [`BlockRasterizer`] implementations.
pub use resvg::usvg::fontdb;
