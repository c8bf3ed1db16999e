//! Integration tests for the PDF and DOCX exporters.
//!
//! These run the whole pipeline (flatten → markup → stage → compose →
//! serialise) against small in-memory reports. System fonts are not loaded,
//! so block heights do not depend on the machine: most tests lay text out
//! from the built-in width table without drawing it, and the bundled
//! DejaVu faces under `tests/fonts` cover real text drawing.

use chrono::NaiveDate;
use meetingmind::fontdb;
use meetingmind::{
    export_docx, export_pdf, export_pdf_sync, export_pdf_to_file, flatten, plan_layout,
    BlockRasterizer, CancelFlag, ExportConfig, ExportError, ExportProgressCallback, Report,
    SectionKind, StagedBlock, SvgRasterizer,
};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=meetingmind=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn export_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 16).unwrap()
}

fn config(staging_root: &Path) -> ExportConfig {
    ExportConfig::builder()
        .staging_root(staging_root)
        .load_system_fonts(false)
        .settle_delay_ms(0)
        .raster_scale(1.0)
        .export_date(export_date())
        .build()
        .unwrap()
}

/// Eight blocks: header, summary, topics header, one topic, follow-ups
/// header, one follow-up, next steps, footer.
fn small_report() -> Report {
    serde_json::from_value(json!({
        "title": "Q4 planning",
        "date": "2024-12-16",
        "participants": ["Kim", "Lee"],
        "summary": "Budget approved; hiring plan drafted.",
        "topics": [
            {
                "title": "Budget",
                "content": "Q4 spend review",
                "subItems": ["Marketing: +10%", "Infra: flat"]
            }
        ],
        "followUps": [
            {
                "task": "Draft hiring plan",
                "assignee": "Lee",
                "deadline": "2024-12-20",
                "priority": "high"
            }
        ],
        "nextSteps": "Review again in January."
    }))
    .unwrap()
}

/// Like [`small_report`] but the topic is far taller than one page.
fn report_with_giant_topic() -> Report {
    let mut report = small_report();
    report.topics[0].sub_items = Some(
        (1..=400)
            .map(|i| format!("Line item {i}: detail that keeps the card growing"))
            .collect(),
    );
    report
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

/// Delegates to [`SvgRasterizer`] and fails on the n-th call (0-based).
struct FailingRasterizer {
    fail_on: usize,
    calls: AtomicUsize,
}

impl BlockRasterizer for FailingRasterizer {
    fn rasterize(
        &self,
        block: &StagedBlock,
        fonts: &Arc<fontdb::Database>,
        scale: f32,
    ) -> Result<image::RgbaImage, String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on {
            return Err("renderer crashed".to_string());
        }
        SvgRasterizer.rasterize(block, fonts, scale)
    }
}

/// Records events and cancels the export once `cancel_after` blocks are done.
struct CancellingCallback {
    flag: CancelFlag,
    cancel_after: usize,
    completed: Mutex<Vec<(usize, SectionKind)>>,
    started: Mutex<Vec<(usize, SectionKind)>>,
}

impl ExportProgressCallback for CancellingCallback {
    fn on_block_start(&self, block_num: usize, _total: usize, kind: SectionKind) {
        self.started.lock().unwrap().push((block_num, kind));
    }

    fn on_block_complete(&self, block_num: usize, _total: usize, _page_num: usize) {
        let kind = self.started.lock().unwrap()[block_num - 1].1;
        self.completed.lock().unwrap().push((block_num, kind));
        if block_num == self.cancel_after {
            self.flag.cancel();
        }
    }
}

// ── PDF export ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn small_report_exports_as_pdf() {
    init_tracing();
    let staging = tempfile::tempdir().unwrap();
    let report = small_report();
    let output = export_pdf(&report, &config(staging.path())).await.unwrap();

    assert!(output.bytes.starts_with(b"%PDF"));
    assert_eq!(output.file_name, "meeting-report-2024-12-16.pdf");
    assert_eq!(output.layout.block_count(), 8);
    assert_eq!(output.stats.total_blocks, 8);
    assert!(output.stats.total_pages >= 1);
    assert_eq!(output.stats.total_pages, output.layout.page_count());
    assert_eq!(output.stats.overflowing_blocks, 0);
    assert_eq!(output.stats.output_bytes, output.bytes.len());
    assert!(dir_is_empty(staging.path()), "staging area must be removed");
}

#[tokio::test]
async fn blocks_are_placed_in_report_order() {
    let staging = tempfile::tempdir().unwrap();
    let output = export_pdf(&small_report(), &config(staging.path()))
        .await
        .unwrap();

    let kinds: Vec<SectionKind> = output.layout.placements().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SectionKind::Header,
            SectionKind::Summary,
            SectionKind::TopicsHeader,
            SectionKind::Topic,
            SectionKind::FollowUpsHeader,
            SectionKind::FollowUp,
            SectionKind::NextSteps,
            SectionKind::Footer,
        ]
    );

    // Within one page, every block starts below the previous one.
    let placements: Vec<_> = output.layout.placements().collect();
    for pair in placements.windows(2) {
        if pair[0].page == pair[1].page {
            assert!(pair[1].y_mm >= pair[0].y_mm + pair[0].height_mm);
        } else {
            assert_eq!(pair[1].page, pair[0].page + 1);
        }
    }
}

#[tokio::test]
async fn render_failure_aborts_without_partial_output() {
    init_tracing();
    let staging = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let rasterizer = Arc::new(FailingRasterizer {
        fail_on: 2,
        calls: AtomicUsize::new(0),
    });
    let mut cfg = config(staging.path());
    cfg.rasterizer = Some(rasterizer.clone());

    let err = export_pdf_to_file(&small_report(), out.path(), &cfg)
        .await
        .unwrap_err();

    match err {
        ExportError::RenderFailed { block, kind, .. } => {
            assert_eq!(block, 2);
            assert_eq!(kind, SectionKind::TopicsHeader);
        }
        other => panic!("expected RenderFailed, got {other:?}"),
    }
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 3);
    assert!(dir_is_empty(staging.path()), "staging area must be removed");
    assert!(dir_is_empty(out.path()), "no artifact on failure");
}

#[tokio::test]
async fn oversized_block_starts_a_fresh_page() {
    init_tracing();
    let staging = tempfile::tempdir().unwrap();
    let cfg = config(staging.path());
    let output = export_pdf(&report_with_giant_topic(), &cfg).await.unwrap();

    let placements: Vec<_> = output.layout.placements().collect();
    let topic = placements
        .iter()
        .find(|p| p.kind == SectionKind::Topic)
        .unwrap();
    let before = placements[topic.block - 1];
    let after = placements[topic.block + 1];

    assert!(topic.overflows);
    assert!(topic.height_mm > cfg.geometry().printable_height_mm());
    assert_eq!(topic.page, before.page + 1);
    assert!((topic.y_mm - cfg.margin_mm).abs() < 1e-3);
    assert_eq!(after.page, topic.page + 1);
    assert_eq!(output.stats.overflowing_blocks, 1);

    // No page is left without a block.
    assert!(output.layout.pages.iter().all(|p| !p.placements.is_empty()));
}

#[tokio::test]
async fn cancellation_stops_before_the_next_block() {
    let staging = tempfile::tempdir().unwrap();
    let flag = CancelFlag::new();
    let callback = Arc::new(CancellingCallback {
        flag: flag.clone(),
        cancel_after: 3,
        completed: Mutex::new(Vec::new()),
        started: Mutex::new(Vec::new()),
    });
    let mut cfg = config(staging.path());
    cfg.cancel = Some(flag);
    cfg.progress_callback = Some(callback.clone());

    let err = export_pdf(&small_report(), &cfg).await.unwrap_err();

    assert!(
        matches!(err, ExportError::Cancelled { completed: 3, total: 8 }),
        "got {err:?}"
    );
    assert_eq!(callback.completed.lock().unwrap().len(), 3);
    assert_eq!(callback.started.lock().unwrap().len(), 3);
    assert!(dir_is_empty(staging.path()));
}

#[tokio::test]
async fn pdf_is_written_into_a_directory() {
    let staging = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let (path, output) = export_pdf_to_file(&small_report(), out.path(), &config(staging.path()))
        .await
        .unwrap();

    assert_eq!(path, out.path().join("meeting-report-2024-12-16.pdf"));
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, output.bytes);
}

#[tokio::test]
async fn planned_layout_matches_the_exported_one() {
    let staging = tempfile::tempdir().unwrap();
    let cfg = config(staging.path());
    let report = report_with_giant_topic();

    let (sections, planned) = plan_layout(&report, &cfg).unwrap();
    let output = export_pdf(&report, &cfg).await.unwrap();

    assert_eq!(sections, flatten(&report));
    assert_eq!(planned, output.layout);
}

fn bundled_fonts() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fonts")
}

#[tokio::test]
async fn bundled_fonts_drive_layout_and_drawing() {
    init_tracing();
    let staging = tempfile::tempdir().unwrap();
    let mut cfg = config(staging.path());
    cfg.font_dirs = vec![bundled_fonts()];
    let mut report = report_with_giant_topic();
    report.summary = "Budget WWWW approved — 예산 승인 ✅ ".repeat(30);

    let (_, planned) = plan_layout(&report, &cfg).unwrap();
    let output = export_pdf(&report, &cfg).await.unwrap();

    assert_eq!(output.stats.font_faces, 2);
    assert_eq!(planned, output.layout);
    assert!(output.bytes.starts_with(b"%PDF"));
}

#[test]
fn planning_reports_a_missing_font_dir() {
    let staging = tempfile::tempdir().unwrap();
    let mut cfg = config(staging.path());
    cfg.font_dirs = vec![staging.path().join("no-such-fonts")];
    let err = plan_layout(&small_report(), &cfg).unwrap_err();
    assert!(matches!(err, ExportError::FontsUnavailable { .. }), "got {err:?}");
}

#[test]
fn sync_wrapper_exports() {
    let staging = tempfile::tempdir().unwrap();
    let output = export_pdf_sync(&small_report(), &config(staging.path())).unwrap();
    assert!(output.bytes.starts_with(b"%PDF"));
    assert_eq!(output.layout.block_count(), 8);
}

// ── DOCX export ──────────────────────────────────────────────────────────────

#[test]
fn docx_export_covers_every_section() {
    let staging = tempfile::tempdir().unwrap();
    let report = small_report();
    let output = export_docx(&report, &config(staging.path())).unwrap();

    // A DOCX is a zip archive.
    assert!(output.bytes.starts_with(b"PK"));
    assert_eq!(output.file_name, "meeting-report-2024-12-16.docx");
    assert_eq!(output.sections, flatten(&report).len());
}
