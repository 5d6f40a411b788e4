//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn CleanProgressCallback>`] via
//! [`crate::config::CleanConfigBuilder::progress_callback`] to receive
//! real-time events as segments and documents complete.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a terminal progress bar, a broadcast channel, or a
//! database record without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because segments are processed
//! concurrently.

use crate::output::{DocumentStatus, SegmentResult};
use std::sync::Arc;

/// Called by the pipeline as it processes segments and documents.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_segment_complete` may be called concurrently from different tasks when
/// several documents are in flight. Implementations must protect shared
/// mutable state with appropriate synchronisation primitives.
pub trait CleanProgressCallback: Send + Sync {
    /// Called once before any document in a batch is planned.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called after a document's chunk plan is ready, before any oracle call.
    fn on_document_start(&self, id: &str, total_segments: usize) {
        let _ = (id, total_segments);
    }

    /// Called as each segment finishes (successfully or not).
    ///
    /// Segments complete out of index order; use `result.index` if order
    /// matters to the display.
    fn on_segment_complete(&self, id: &str, result: &SegmentResult) {
        let _ = (id, result);
    }

    /// Called once per document with its terminal status.
    fn on_document_complete(&self, id: &str, status: &DocumentStatus) {
        let _ = (id, status);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CleanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CleanConfig`].
pub type ProgressCallback = Arc<dyn CleanProgressCallback>;
