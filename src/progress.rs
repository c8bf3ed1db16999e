//! Progress-callback trait for per-block export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as the pipeline renders and places each block.
//!
//! # Example
//!
//! ```rust
//! use meetingmind::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     pages: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for PageCounter {
//!     fn on_page_opened(&self, page_num: usize) {
//!         self.pages.store(page_num, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter { pages: AtomicUsize::new(0) });
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::flatten::SectionKind;
use std::sync::Arc;

/// Called by the export pipeline as it processes each block.
///
/// Blocks of one export are processed strictly in order, but several
/// exports may share one callback, so implementations must be
/// `Send + Sync`. All methods have default no-op implementations.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once, after flattening and before the staging area opens.
    ///
    /// # Arguments
    /// * `total_blocks` — number of blocks the report flattened into
    fn on_export_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called before a block's markup is rendered.
    ///
    /// # Arguments
    /// * `block_num` — 1-indexed block number
    /// * `total`     — total blocks
    /// * `kind`      — which section the block renders
    fn on_block_start(&self, block_num: usize, total: usize, kind: SectionKind) {
        let _ = (block_num, total, kind);
    }

    /// Called once a block has been placed.
    ///
    /// # Arguments
    /// * `block_num` — 1-indexed block number
    /// * `total`     — total blocks
    /// * `page_num`  — 1-indexed page the block starts on
    fn on_block_complete(&self, block_num: usize, total: usize, page_num: usize) {
        let _ = (block_num, total, page_num);
    }

    /// Called when the compositor opens a page (including the first).
    fn on_page_opened(&self, page_num: usize) {
        let _ = page_num;
    }

    /// Called when a block fails; the export stops right after.
    fn on_block_error(&self, block_num: usize, total: usize, error: &str) {
        let _ = (block_num, total, error);
    }

    /// Called once the artifact bytes exist.
    fn on_export_complete(&self, total_blocks: usize, total_pages: usize) {
        let _ = (total_blocks, total_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        kinds: Mutex<Vec<SectionKind>>,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_block_start(&self, _block_num: usize, _total: usize, kind: SectionKind) {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.kinds.lock().unwrap().push(kind);
        }

        fn on_block_complete(&self, _block_num: usize, _total: usize, _page_num: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_block_error(&self, _block_num: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_export_start(8);
        cb.on_block_start(1, 8, SectionKind::Header);
        cb.on_page_opened(1);
        cb.on_block_complete(1, 8, 1);
        cb.on_block_error(2, 8, "bad markup");
        cb.on_export_complete(8, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_block_start(1, 3, SectionKind::Header);
        tracker.on_block_complete(1, 3, 1);
        tracker.on_block_start(2, 3, SectionKind::Summary);
        tracker.on_block_error(2, 3, "raster failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.kinds.lock().unwrap(),
            vec![SectionKind::Header, SectionKind::Summary]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_export_start(10);
        cb.on_block_complete(1, 10, 1);
    }
}
