//! Error types for the meetingmind library.
//!
//! Three error types reflect three distinct boundaries:
//!
//! * [`ExportError`] — **Fatal** for one export call. The pipeline has no
//!   partial-document recovery: a block that fails to render, a document
//!   that fails to serialise, or a cancelled run all end the call with a
//!   single terminal error and no artifact.
//!
//! * [`crate::report::ReportParseError`] — the summarisation reply could
//!   not be parsed as a report. Raised at the collaborator boundary so the
//!   export core is never handed an invalid report.
//!
//! * [`SummarizeError`] — the summarisation collaborator itself failed
//!   (no provider, API error, timeout, unparseable reply).

use crate::pipeline::flatten::SectionKind;
use crate::report::ReportParseError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the export entry points.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Staging errors ────────────────────────────────────────────────────
    /// The off-screen staging directory could not be created.
    #[error("Failed to create staging area under '{root}': {source}")]
    StagingFailed {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured font directory does not exist.
    #[error("Font directory not found: '{path}'\nCheck --font-dir or unset it to use system fonts.")]
    FontsUnavailable { path: PathBuf },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// A block could not be rendered or rasterised.
    #[error("Rendering failed for block {block} ({kind}): {detail}")]
    RenderFailed {
        block: usize,
        kind: SectionKind,
        detail: String,
    },

    /// The raster did not have the height its markup declared.
    ///
    /// The compositor trusts the measured height exactly; placing a block
    /// whose pixels disagree would overlap or clip its neighbours.
    #[error("Block {block} rasterised to {actual}px high, expected {expected}px")]
    HeightMismatch {
        block: usize,
        expected: u32,
        actual: u32,
    },

    // ── Serialisation errors ──────────────────────────────────────────────
    /// The composed pages could not be written as a document.
    #[error("Failed to serialise document: {0}")]
    SerializationFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Control flow ──────────────────────────────────────────────────────
    /// The caller raised the cancellation flag between two blocks.
    #[error("Export cancelled after {completed}/{total} blocks")]
    Cancelled { completed: usize, total: usize },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    /// Index of the block that caused the failure, when there is one.
    pub fn block(&self) -> Option<usize> {
        match self {
            ExportError::RenderFailed { block, .. } | ExportError::HeightMismatch { block, .. } => {
                Some(*block)
            }
            _ => None,
        }
    }
}

/// Errors from the summarisation collaborator.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Nothing to summarise.
    #[error("No meeting material or transcript was provided")]
    NoInput,

    /// A material or transcript file could not be read.
    #[error("Failed to read meeting input '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM call did not answer in time.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The reply could not be parsed as a report.
    #[error(transparent)]
    Parse(#[from] ReportParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failed_display() {
        let e = ExportError::RenderFailed {
            block: 2,
            kind: SectionKind::Topic,
            detail: "bad markup".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("block 2"), "got: {msg}");
        assert!(msg.contains("topic"), "got: {msg}");
        assert_eq!(e.block(), Some(2));
    }

    #[test]
    fn height_mismatch_display() {
        let e = ExportError::HeightMismatch {
            block: 4,
            expected: 200,
            actual: 180,
        };
        assert!(e.to_string().contains("180px"));
        assert_eq!(e.block(), Some(4));
    }

    #[test]
    fn cancelled_display() {
        let e = ExportError::Cancelled {
            completed: 3,
            total: 8,
        };
        assert!(e.to_string().contains("3/8"));
        assert_eq!(e.block(), None);
    }

    #[test]
    fn summarize_timeout_display() {
        let e = SummarizeError::Timeout { secs: 90 };
        assert!(e.to_string().contains("90s"));
    }
}
