//! Drive one segment through the oracle with retry, backoff, and
//! response validation.
//!
//! This module is intentionally thin — the instruction wording lives in
//! [`crate::prompts`] and protocol mapping in [`crate::pipeline::oracle`],
//! so retry and classification logic here stays independent of both.
//!
//! ## Retry Strategy
//!
//! Rate limits and 5xx errors are frequent under concurrent load and almost
//! always transient. The injected [`BackoffPolicy`] gives the exponential
//! schedule (500 ms → 1 s → 2 s by default); a server-supplied `Retry-After`
//! is honoured when it exceeds the policy's own delay. Fatal errors (auth,
//! malformed request) skip retries entirely.

use crate::config::BackoffPolicy;
use crate::error::OracleError;
use crate::output::{SegmentResult, StructuralWarning, TransformStatus};
use crate::pipeline::oracle::TransformOracle;
use crate::pipeline::planner::Segment;
use std::time::Instant;
use tokio::time::sleep;
use tracing::warn;

/// Transform one segment, returning a result in every case.
///
/// Never propagates an error upward: failures are classified into the
/// result's [`TransformStatus`] so one bad segment cannot abort its
/// siblings. The orchestrator decides what a fatal status means for the
/// document.
pub async fn transform_segment(
    oracle: &dyn TransformOracle,
    segment: &Segment,
    instructions: &str,
    policy: &BackoffPolicy,
    divergence_tolerance: f32,
) -> SegmentResult {
    let started = Instant::now();
    let mut last_error: Option<OracleError> = None;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            let mut delay = policy.delay_for(attempt - 1);
            if let Some(OracleError::RateLimited {
                retry_after_secs: Some(secs),
            }) = &last_error
            {
                delay = delay.max(std::time::Duration::from_secs(*secs));
            }
            warn!(
                segment = segment.index,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying segment transform"
            );
            sleep(delay).await;
        }

        match oracle.transform(instructions, &segment.text).await {
            Ok(text) => {
                let warning = structural_check(&segment.text, &text, divergence_tolerance);
                if let Some(w) = &warning {
                    warn!(segment = segment.index, warning = ?w, "structural divergence in oracle output");
                }
                return SegmentResult {
                    index: segment.index,
                    text,
                    estimated_tokens: segment.estimated_tokens,
                    attempts: attempt,
                    duration_ms: started.elapsed().as_millis() as u64,
                    status: TransformStatus::Success,
                    warning,
                };
            }
            Err(e) if e.is_transient() => {
                warn!(segment = segment.index, attempt, error = %e, "transient oracle failure");
                last_error = Some(e);
            }
            Err(e) => {
                warn!(segment = segment.index, error = %e, "fatal oracle failure");
                return SegmentResult {
                    index: segment.index,
                    text: String::new(),
                    estimated_tokens: segment.estimated_tokens,
                    attempts: attempt,
                    duration_ms: started.elapsed().as_millis() as u64,
                    status: TransformStatus::FatalFailure {
                        detail: e.to_string(),
                    },
                    warning: None,
                };
            }
        }
    }

    let detail = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());
    SegmentResult {
        index: segment.index,
        text: String::new(),
        estimated_tokens: segment.estimated_tokens,
        attempts: policy.max_attempts,
        duration_ms: started.elapsed().as_millis() as u64,
        status: TransformStatus::RetryableFailure {
            attempts: policy.max_attempts,
            detail,
        },
        warning: None,
    }
}

/// Result for a segment whose dispatch was aborted before any oracle call.
pub(crate) fn aborted(segment: &Segment) -> SegmentResult {
    SegmentResult {
        index: segment.index,
        text: String::new(),
        estimated_tokens: segment.estimated_tokens,
        attempts: 0,
        duration_ms: 0,
        status: TransformStatus::RetryableFailure {
            attempts: 0,
            detail: "dispatch aborted".to_string(),
        },
        warning: None,
    }
}

/// Flag oracle output that looks truncated or inflated.
///
/// A formatting-only pass should return roughly input-sized text. Output
/// whose character count falls outside `[input × tolerance, input ÷
/// tolerance]` — or that is empty outright — is kept, but flagged.
fn structural_check(input: &str, output: &str, tolerance: f32) -> Option<StructuralWarning> {
    if output.trim().is_empty() {
        return Some(StructuralWarning::EmptyResponse);
    }
    let input_chars = input.chars().count().max(1);
    let ratio = output.chars().count() as f32 / input_chars as f32;
    if ratio < tolerance || ratio > 1.0 / tolerance {
        return Some(StructuralWarning::LengthDivergence { ratio });
    }
    None
}
