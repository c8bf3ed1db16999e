//! Output types returned by the exporters.

use crate::pipeline::compose::Document;
use serde::Serialize;

/// The result of a PDF export.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// The complete PDF.
    pub bytes: Vec<u8>,
    /// Generated artifact name, e.g. `meeting-report-2024-12-16.pdf`.
    pub file_name: String,
    /// Where every block ended up.
    pub layout: Document,
    pub stats: ExportStats,
}

/// Counters and timings of one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportStats {
    pub total_blocks: usize,
    pub total_pages: usize,
    /// Blocks taller than the printable height.
    pub overflowing_blocks: usize,
    /// Font faces available to the rasteriser.
    pub font_faces: usize,
    pub output_bytes: usize,
    pub render_duration_ms: u64,
    pub serialize_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The result of a flow-document (DOCX) export.
#[derive(Debug, Clone)]
pub struct FlowOutput {
    pub bytes: Vec<u8>,
    /// Generated artifact name, e.g. `meeting-report-2024-12-16.docx`.
    pub file_name: String,
    /// Number of sections written.
    pub sections: usize,
}

/// Machine-readable summary of an export, printed by `meetingmind export --json`.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary<'a> {
    pub file_name: &'a str,
    pub stats: &'a ExportStats,
    pub layout: &'a Document,
}

impl ExportOutput {
    pub fn summary(&self) -> ExportSummary<'_> {
        ExportSummary {
            file_name: &self.file_name,
            stats: &self.stats,
            layout: &self.layout,
        }
    }
}
