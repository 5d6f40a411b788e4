//! Reassembly: ordered concatenation of transformed segments.
//!
//! The reassembler is deliberately strict. It refuses to produce output
//! unless every index of the plan has a successful result — a document with
//! a silently missing middle is worse than no document. The orchestrator
//! checks completeness before calling in, so
//! [`CleanError::IncompleteResultSet`] surfacing to a caller means a
//! programming error, not an operational condition.

use crate::error::CleanError;
use crate::output::SegmentResult;
use crate::pipeline::planner::ChunkPlan;

/// Concatenate successful results in index order.
///
/// Validates that the successful indices are exactly `{0..plan.len()}`:
/// duplicates and out-of-range indices are contract violations, missing
/// indices produce [`CleanError::IncompleteResultSet`]. Segments are joined
/// with a single normalised paragraph break.
///
/// A zero-segment plan reassembles to the empty string.
pub fn reassemble(plan: &ChunkPlan, results: &[SegmentResult]) -> Result<String, CleanError> {
    let total = plan.len();
    let mut texts: Vec<Option<&str>> = vec![None; total];

    for result in results.iter().filter(|r| r.status.is_success()) {
        if result.index >= total {
            return Err(CleanError::Internal(format!(
                "segment index {} out of range for a {}-segment plan",
                result.index, total
            )));
        }
        if texts[result.index].is_some() {
            return Err(CleanError::Internal(format!(
                "duplicate result for segment index {}",
                result.index
            )));
        }
        texts[result.index] = Some(result.text.as_str());
    }

    let missing: Vec<usize> = texts
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.is_none().then_some(i))
        .collect();
    if !missing.is_empty() {
        return Err(CleanError::IncompleteResultSet { missing, total });
    }

    Ok(texts
        .into_iter()
        .flatten()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n\n"))
}
