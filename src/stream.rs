//! Streaming cleanup API: emit segment results as they complete.
//!
//! ## Why stream?
//!
//! Large documents take minutes. A streams-based API lets callers display
//! partial progress immediately or persist segments incrementally instead of
//! buffering the whole document. Unlike the eager
//! [`crate::clean::clean_document`], which classifies the terminal state and
//! reassembles, [`clean_stream`] yields raw [`SegmentResult`]s in completion
//! order — sort by `index` and feed them to
//! [`crate::pipeline::reassemble::reassemble`] if you need the final
//! document.
//!
//! The stream applies no document deadline and no fatal short-circuit; those
//! policies belong to the eager orchestrator. Callers consuming a stream can
//! simply stop polling.

use crate::config::CleanConfig;
use crate::error::CleanError;
use crate::output::{Document, SegmentResult};
use crate::pipeline::oracle::TransformOracle;
use crate::pipeline::{normalize, planner, tokens::TokenEstimator, transform};
use crate::prompts::DEFAULT_INSTRUCTION_PROFILE;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of segment results.
pub type SegmentStream = Pin<Box<dyn Stream<Item = SegmentResult> + Send>>;

/// Clean a document, streaming segment results as they are ready.
///
/// Results arrive in completion order, not index order. Successful results
/// are already normalized.
///
/// # Errors
/// `Err(CleanError)` only for configuration-level failures (unknown
/// tokenization scheme).
pub fn clean_stream(
    doc: &Document,
    oracle: &Arc<dyn TransformOracle>,
    config: &CleanConfig,
) -> Result<SegmentStream, CleanError> {
    let estimator = TokenEstimator::for_scheme(&config.scheme)?;
    let plan = planner::plan(&doc.text, config.max_segment_tokens, &estimator);
    info!(document = %doc.id, segments = plan.len(), "streaming cleanup started");

    let instructions = config
        .instruction_profile
        .clone()
        .unwrap_or_else(|| DEFAULT_INSTRUCTION_PROFILE.to_string());
    let policy = config.backoff.clone();
    let tolerance = config.divergence_tolerance;
    let oracle = Arc::clone(oracle);
    let segments: Vec<planner::Segment> = plan.segments().to_vec();

    let s = stream::iter(segments.into_iter().map(move |segment| {
        let oracle = Arc::clone(&oracle);
        let instructions = instructions.clone();
        let policy = policy.clone();
        async move {
            let mut result = transform::transform_segment(
                oracle.as_ref(),
                &segment,
                &instructions,
                &policy,
                tolerance,
            )
            .await;
            if result.status.is_success() {
                result.text = normalize::clean_segment(&result.text);
            }
            result
        }
    }))
    .buffer_unordered(config.concurrency);

    Ok(Box::pin(s))
}
