//! Error types for the mdpolish library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CleanError`] — **Fatal**: the cleanup run cannot proceed at all
//!   (unknown tokenization scheme, invalid configuration, unreadable input).
//!   Returned as `Err(CleanError)` from the top-level `clean_*` functions.
//!
//! * [`OracleError`] — **Per-call**: one request to the transformation oracle
//!   failed. Classified at the transformation-client boundary into transient
//!   (retried with backoff) and fatal (propagated immediately); after retry
//!   exhaustion the failure is recorded in the segment's
//!   [`crate::output::TransformStatus`] rather than aborting the run.
//!
//! The separation keeps document-level results honest: a caller always gets
//! either a complete cleaned document or an explicit partial result naming
//! the failed segments, never a silently truncated one.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mdpolish library.
///
/// Segment-level failures are recorded in
/// [`crate::output::SegmentResult::status`] rather than propagated here.
#[derive(Debug, Error)]
pub enum CleanError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The tokenization scheme identifier is not one we can resolve.
    #[error(
        "unsupported tokenization scheme '{scheme}'\n\
         Supported: cl100k_base, o200k_base, p50k_base, r50k_base, words"
    )]
    UnsupportedScheme { scheme: String },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read an input document.
    #[error("failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the cleaned output file.
    #[error("failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Contract violations ───────────────────────────────────────────────
    /// Reassembly was attempted on an incomplete result set.
    ///
    /// The orchestrator checks completeness before reassembling, so seeing
    /// this error means a caller drove [`crate::pipeline::reassemble`]
    /// directly with missing indices. It is never swallowed.
    #[error("incomplete result set: missing segment indices {missing:?} of {total}")]
    IncompleteResultSet { missing: Vec<usize>, total: usize },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A single failed call to the transformation oracle.
///
/// Classified by [`OracleError::is_transient`]: transient errors are retried
/// under the configured [`crate::config::BackoffPolicy`]; fatal errors abort
/// the current document immediately (but never its batch siblings).
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// HTTP 429 — the service asked us to back off.
    ///
    /// `retry_after_secs` carries a server-specified delay when present; the
    /// retry loop honours it if it exceeds the policy's own schedule.
    #[error("oracle rate limited{}", retry_after_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// The call exceeded the per-request timeout.
    #[error("oracle call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Connection-level failure before any HTTP status was received.
    #[error("oracle transport error: {detail}")]
    Transport { detail: String },

    /// The service answered with a retryable error status (5xx, 408).
    #[error("oracle service error (HTTP {status}): {detail}")]
    Service { status: u16, detail: String },

    /// The response body could not be decoded or carried no content.
    #[error("oracle protocol error: {detail}")]
    Protocol { detail: String },

    /// Authentication failure (401/403) — retrying cannot help.
    #[error("oracle authentication failed: {detail}")]
    Auth { detail: String },

    /// The service rejected the request as malformed (400/404/422).
    #[error("oracle rejected request: {detail}")]
    MalformedRequest { detail: String },
}

impl OracleError {
    /// Whether the retry loop should attempt this call again.
    ///
    /// [`Protocol`](OracleError::Protocol) counts as transient: an
    /// undecodable body is indistinguishable from a service glitch, and a
    /// retry is cheap relative to losing the segment.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::RateLimited { .. }
            | OracleError::Timeout { .. }
            | OracleError::Transport { .. }
            | OracleError::Service { .. }
            | OracleError::Protocol { .. } => true,
            OracleError::Auth { .. } | OracleError::MalformedRequest { .. } => false,
        }
    }
}

fn retry_after_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}
