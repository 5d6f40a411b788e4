//! Eager (full-document) cleanup entry points.
//!
//! ## Why eager vs. streaming?
//!
//! This module provides the simpler API: wait for all segments, then return
//! a [`DocumentReport`] with the reassembled document. Use
//! [`crate::stream::clean_stream`] instead when you want segment results
//! progressively.
//!
//! ## Failure domains
//!
//! Each document is its own failure domain. A fatal oracle error cancels
//! the remaining segments of *that* document and marks it `Failed`; sibling
//! documents in the same batch keep running. The only resource shared
//! across documents is the semaphore bounding outbound oracle calls.

use crate::config::CleanConfig;
use crate::error::CleanError;
use crate::output::{
    BatchReport, CleanStats, CleanedDocument, Document, DocumentReport, DocumentStatus,
    SegmentResult, TransformStatus,
};
use crate::pipeline::{normalize, planner, reassemble, tokens::TokenEstimator, transform};
use crate::pipeline::oracle::TransformOracle;
use crate::prompts::DEFAULT_INSTRUCTION_PROFILE;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Clean a single document.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(DocumentReport)` whenever processing ran, even if segments failed —
/// check `report.status`. A `Completed` report carries the reassembled
/// [`CleanedDocument`]; a `PartiallyFailed` one names the missing segment
/// indices instead of fabricating text.
///
/// # Errors
/// `Err(CleanError)` only for configuration-level failures detected before
/// any oracle traffic (unknown tokenization scheme).
pub async fn clean_document(
    doc: &Document,
    oracle: &Arc<dyn TransformOracle>,
    config: &CleanConfig,
) -> Result<DocumentReport, CleanError> {
    let estimator = TokenEstimator::for_scheme(&config.scheme)?;
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    Ok(clean_with(doc, oracle, config, &estimator, semaphore).await)
}

/// Clean a batch of documents.
///
/// Documents run concurrently with isolated failure domains: one document's
/// fatal failure never cancels its siblings. Outbound oracle calls across
/// the whole batch share one semaphore so the external service sees at most
/// `config.concurrency` requests in flight.
///
/// Report order matches input order.
///
/// # Errors
/// `Err(CleanError)` only for configuration-level failures, detected before
/// any document is processed.
pub async fn clean_batch(
    docs: &[Document],
    oracle: &Arc<dyn TransformOracle>,
    config: &CleanConfig,
) -> Result<BatchReport, CleanError> {
    // Fail fast on a bad scheme before any oracle traffic.
    let estimator = TokenEstimator::for_scheme(&config.scheme)?;
    let semaphore = Arc::new(Semaphore::new(config.concurrency));

    if let Some(cb) = &config.progress {
        cb.on_batch_start(docs.len());
    }
    info!(documents = docs.len(), "starting batch cleanup");

    let documents = futures::future::join_all(
        docs.iter()
            .map(|doc| clean_with(doc, oracle, config, &estimator, Arc::clone(&semaphore))),
    )
    .await;

    let report = BatchReport { documents };
    info!(
        completed = report.completed(),
        partially_failed = report.partially_failed(),
        failed = report.failed(),
        "batch cleanup finished"
    );
    Ok(report)
}

/// Clean a document and write the result to a file.
///
/// Uses an atomic write (temp file + rename) so a crash never leaves a
/// half-written output. The file is written only when the document reaches
/// `Completed`; the report is returned either way so callers can inspect
/// partial failures.
pub async fn clean_to_file(
    doc: &Document,
    oracle: &Arc<dyn TransformOracle>,
    config: &CleanConfig,
    output_path: impl AsRef<Path>,
) -> Result<DocumentReport, CleanError> {
    let report = clean_document(doc, oracle, config).await?;
    let Some(cleaned) = &report.cleaned else {
        return Ok(report);
    };

    let path = output_path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CleanError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &cleaned.text)
        .await
        .map_err(|e| CleanError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| CleanError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(report)
}

/// Synchronous wrapper around [`clean_document`].
///
/// Creates a temporary tokio runtime internally; do not call from within an
/// async context.
pub fn clean_sync(
    doc: &Document,
    oracle: &Arc<dyn TransformOracle>,
    config: &CleanConfig,
) -> Result<DocumentReport, CleanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CleanError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(clean_document(doc, oracle, config))
}

// ── Internal orchestration ───────────────────────────────────────────────

/// Run one document through plan → transform → reassemble.
///
/// Per-document state machine: PLANNED → IN_PROGRESS → {COMPLETED,
/// PARTIALLY_FAILED, FAILED}. Transitions are logged; the terminal state is
/// the report's [`DocumentStatus`].
pub(crate) async fn clean_with(
    doc: &Document,
    oracle: &Arc<dyn TransformOracle>,
    config: &CleanConfig,
    estimator: &TokenEstimator,
    semaphore: Arc<Semaphore>,
) -> DocumentReport {
    let total_start = std::time::Instant::now();

    // ── Plan ─────────────────────────────────────────────────────────────
    let plan = planner::plan(&doc.text, config.max_segment_tokens, estimator);
    let total = plan.len();
    let over_budget = plan.over_budget_indices();
    for index in &over_budget {
        warn!(
            document = %doc.id,
            segment = index,
            "segment exceeds token budget (indivisible unit); processing continues"
        );
    }
    info!(document = %doc.id, segments = total, "document planned");
    if let Some(cb) = &config.progress {
        cb.on_document_start(&doc.id, total);
    }

    if total == 0 {
        let status = DocumentStatus::Completed;
        if let Some(cb) = &config.progress {
            cb.on_document_complete(&doc.id, &status);
        }
        return DocumentReport {
            id: doc.id.clone(),
            status,
            cleaned: Some(CleanedDocument {
                id: doc.id.clone(),
                text: String::new(),
            }),
            segments: Vec::new(),
            stats: CleanStats {
                total_duration_ms: total_start.elapsed().as_millis() as u64,
                ..CleanStats::default()
            },
        };
    }

    // ── Transform (IN_PROGRESS) ──────────────────────────────────────────
    let instructions = config
        .instruction_profile
        .clone()
        .unwrap_or_else(|| DEFAULT_INSTRUCTION_PROFILE.to_string());
    let deadline = Instant::now() + Duration::from_secs(config.document_timeout_secs);
    let transform_start = std::time::Instant::now();

    let segments: Vec<planner::Segment> = plan.segments().to_vec();
    let mut inflight = stream::iter(segments.into_iter().map(|segment| {
        let oracle = Arc::clone(oracle);
        let semaphore = Arc::clone(&semaphore);
        let instructions = instructions.clone();
        let policy = config.backoff.clone();
        let tolerance = config.divergence_tolerance;
        async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return transform::aborted(&segment),
            };
            transform::transform_segment(
                oracle.as_ref(),
                &segment,
                &instructions,
                &policy,
                tolerance,
            )
            .await
        }
    }))
    .buffer_unordered(config.concurrency);

    let mut results: Vec<SegmentResult> = Vec::with_capacity(total);
    let mut fatal_reason: Option<String> = None;
    let mut deadline_expired = false;

    loop {
        match tokio::time::timeout_at(deadline, inflight.next()).await {
            Err(_) => {
                deadline_expired = true;
                break;
            }
            Ok(None) => break,
            Ok(Some(result)) => {
                if let Some(cb) = &config.progress {
                    cb.on_segment_complete(&doc.id, &result);
                }
                debug!(
                    document = %doc.id,
                    segment = result.index,
                    attempts = result.attempts,
                    status = ?result.status,
                    "segment finished"
                );
                if let TransformStatus::FatalFailure { detail } = &result.status {
                    fatal_reason = Some(detail.clone());
                    results.push(result);
                    break;
                }
                results.push(result);
            }
        }
    }
    // Dropping the stream cancels outstanding calls for this document only.
    drop(inflight);
    let transform_duration_ms = transform_start.elapsed().as_millis() as u64;

    results.sort_by_key(|r| r.index);
    for result in &mut results {
        if result.status.is_success() {
            result.text = normalize::clean_segment(&result.text);
        }
    }

    // ── Classify terminal state ──────────────────────────────────────────
    let transformed = results.iter().filter(|r| r.status.is_success()).count();
    let failed = results.iter().filter(|r| !r.status.is_success()).count();
    let stats = CleanStats {
        total_segments: total,
        transformed_segments: transformed,
        failed_segments: failed,
        skipped_segments: total.saturating_sub(results.len()),
        over_budget_segments: over_budget.len(),
        estimated_input_tokens: plan.segments().iter().map(|s| s.estimated_tokens).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        transform_duration_ms,
    };

    let (status, cleaned) = if let Some(reason) = fatal_reason {
        error!(document = %doc.id, %reason, "document failed");
        (DocumentStatus::Failed { reason }, None)
    } else {
        let missing = missing_indices(total, &results);
        if missing.is_empty() {
            match reassemble::reassemble(&plan, &results) {
                Ok(text) => {
                    info!(
                        document = %doc.id,
                        segments = total,
                        duration_ms = stats.total_duration_ms,
                        "document completed"
                    );
                    (
                        DocumentStatus::Completed,
                        Some(CleanedDocument {
                            id: doc.id.clone(),
                            text,
                        }),
                    )
                }
                // Completeness was checked above, so this is unreachable in
                // practice; surface it loudly rather than swallowing.
                Err(e) => {
                    error!(document = %doc.id, error = %e, "reassembly contract violation");
                    (
                        DocumentStatus::Failed {
                            reason: e.to_string(),
                        },
                        None,
                    )
                }
            }
        } else {
            if deadline_expired {
                warn!(
                    document = %doc.id,
                    timeout_secs = config.document_timeout_secs,
                    "document deadline expired; partial results preserved"
                );
            }
            warn!(document = %doc.id, missing = ?missing, "document partially failed");
            (DocumentStatus::PartiallyFailed { missing }, None)
        }
    };

    if let Some(cb) = &config.progress {
        cb.on_document_complete(&doc.id, &status);
    }

    DocumentReport {
        id: doc.id.clone(),
        status,
        cleaned,
        segments: results,
        stats,
    }
}

/// Plan indices without a successful result (failed or never completed).
fn missing_indices(total: usize, results: &[SegmentResult]) -> Vec<usize> {
    let mut present = vec![false; total];
    for result in results.iter().filter(|r| r.status.is_success()) {
        if result.index < total {
            present[result.index] = true;
        }
    }
    present
        .iter()
        .enumerate()
        .filter_map(|(i, ok)| (!ok).then_some(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::StructuralWarning;

    fn success(index: usize) -> SegmentResult {
        SegmentResult {
            index,
            text: "ok".into(),
            estimated_tokens: 1,
            attempts: 1,
            duration_ms: 0,
            status: TransformStatus::Success,
            warning: None,
        }
    }

    #[test]
    fn missing_indices_counts_failures_and_gaps() {
        let results = vec![
            success(0),
            SegmentResult {
                status: TransformStatus::RetryableFailure {
                    attempts: 3,
                    detail: "x".into(),
                },
                ..success(1)
            },
            success(3),
        ];
        assert_eq!(missing_indices(4, &results), vec![1, 2]);
    }

    #[test]
    fn missing_indices_empty_when_complete() {
        let results = vec![success(0), success(1)];
        assert!(missing_indices(2, &results).is_empty());
    }

    #[test]
    fn warnings_do_not_make_a_segment_missing() {
        let mut r = success(0);
        r.warning = Some(StructuralWarning::EmptyResponse);
        assert!(missing_indices(1, &[r]).is_empty());
    }
}
