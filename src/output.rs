//! Result types produced by the cleanup pipeline.
//!
//! Everything here derives `Serialize`/`Deserialize` so callers can dump a
//! full [`BatchReport`] as JSON for post-run inspection, and tests can
//! round-trip results without bespoke comparison code.

use crate::error::CleanError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An input document: an identifier plus raw Markdown text.
///
/// Immutable once constructed. The identifier is typically the source path
/// or file name; it is carried through to the [`CleanedDocument`] and every
/// log line so batch output stays attributable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Load a document from a file, using the path as its identifier.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CleanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CleanError::InputReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            id: path.display().to_string(),
            text,
        })
    }
}

/// Terminal outcome of transforming one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformStatus {
    /// The oracle returned usable text (possibly with a structural warning).
    Success,
    /// Every attempt hit a transient error; the segment can be re-run.
    RetryableFailure { attempts: u32, detail: String },
    /// A non-retryable error (auth, malformed request) aborted the segment.
    FatalFailure { detail: String },
}

impl TransformStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TransformStatus::Success)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, TransformStatus::FatalFailure { .. })
    }
}

/// Structural validation flag on an otherwise successful transformation.
///
/// These are warnings, not failures: the best-effort text is kept, but the
/// caller can see that the oracle's output looks truncated or inflated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StructuralWarning {
    /// The oracle returned empty or whitespace-only text.
    EmptyResponse,
    /// Output length diverged from the input beyond the configured tolerance.
    ///
    /// `ratio` is output characters over input characters.
    LengthDivergence { ratio: f32 },
}

/// Result of transforming one segment through the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResult {
    /// 0-based position in the chunk plan.
    pub index: usize,
    /// The oracle's returned text (empty on failure).
    pub text: String,
    /// Token estimate of the *input* segment, copied from the plan.
    pub estimated_tokens: usize,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
    /// Wall-clock time spent on this segment, including retries.
    pub duration_ms: u64,
    pub status: TransformStatus,
    pub warning: Option<StructuralWarning>,
}

/// A cleaned document: the input identifier plus reassembled text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedDocument {
    pub id: String,
    pub text: String,
}

/// Terminal state of one document's cleanup run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Every segment succeeded and the document was reassembled.
    Completed,
    /// Some segments are missing (retry exhaustion or deadline expiry).
    ///
    /// `missing` names exactly the segment indices without a successful
    /// result so a caller can re-run just those. No text is fabricated.
    PartiallyFailed { missing: Vec<usize> },
    /// A fatal failure aborted this document (its batch siblings continue).
    Failed { reason: String },
}

/// Timing and accounting for one document's run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanStats {
    /// Segments in the chunk plan.
    pub total_segments: usize,
    /// Segments that ended [`TransformStatus::Success`].
    pub transformed_segments: usize,
    /// Segments that ended in a retryable or fatal failure.
    pub failed_segments: usize,
    /// Segments never dispatched or cancelled by deadline/fatal abort.
    pub skipped_segments: usize,
    /// Plan segments whose estimate exceeded the budget (indivisible units).
    pub over_budget_segments: usize,
    /// Sum of the plan's per-segment token estimates.
    pub estimated_input_tokens: usize,
    pub total_duration_ms: u64,
    pub transform_duration_ms: u64,
}

/// Full per-document outcome: status, per-segment results, and stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub id: String,
    pub status: DocumentStatus,
    /// Present only when `status` is [`DocumentStatus::Completed`].
    pub cleaned: Option<CleanedDocument>,
    /// Collected segment results, sorted by index. May be shorter than the
    /// plan when segments were cancelled.
    pub segments: Vec<SegmentResult>,
    pub stats: CleanStats,
}

impl DocumentReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, DocumentStatus::Completed)
    }
}

/// Outcome of a batch run; document order matches the input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.documents.iter().filter(|d| d.is_completed()).count()
    }

    pub fn partially_failed(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.status, DocumentStatus::PartiallyFailed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.status, DocumentStatus::Failed { .. }))
            .count()
    }
}
