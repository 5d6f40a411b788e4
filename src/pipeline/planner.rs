//! Chunk planning: split a document into token-bounded segments.
//!
//! The planner prefers natural break points in descending priority — ATX
//! heading lines, blank-line paragraph boundaries, sentence boundaries — and
//! accumulates greedily: a segment is closed at the last viable break point
//! before the budget would be exceeded.
//!
//! A single sentence that alone exceeds the budget becomes its own segment
//! and is flagged via [`ChunkPlan::over_budget_indices`]; planning never
//! fails. Splitting below sentence level would cut mid-clause and give the
//! oracle fragments it cannot normalise faithfully.
//!
//! Planning is a pure function of `(text, budget, estimator)`: same inputs,
//! same plan.

use crate::pipeline::tokens::TokenEstimator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A contiguous slice of a document's text, bounded by the token budget.
///
/// Created only by [`plan`]; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// 0-based position in the plan.
    pub index: usize,
    pub text: String,
    /// Token estimate of `text`, measured on the final segment text (not a
    /// sum of unit estimates, which BPE boundary effects can skew).
    pub estimated_tokens: usize,
}

/// The ordered list of segments covering one document.
///
/// Invariants: indices are `0..len` with no gaps; segments are contiguous
/// and non-overlapping; concatenating their texts in order reconstructs the
/// document up to whitespace normalisation at break points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    segments: Vec<Segment>,
    budget: usize,
}

impl ChunkPlan {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The token budget this plan was built against.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Indices of segments whose estimate exceeds the budget.
    ///
    /// Non-empty only when an indivisible unit (a single oversized sentence)
    /// had to become its own segment. A warning condition, not a failure.
    pub fn over_budget_indices(&self) -> Vec<usize> {
        self.segments
            .iter()
            .filter(|s| s.estimated_tokens > self.budget)
            .map(|s| s.index)
            .collect()
    }
}

// Heading detection matches ATX headings at line starts; setext headings are
// rare in machine-produced Markdown and fall through to paragraph splitting.
static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]").unwrap());
static RE_PARA_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

/// Split `text` into a [`ChunkPlan`] under `budget` tokens per segment.
///
/// * Empty or whitespace-only input → a plan with zero segments.
/// * Whole document within budget (inclusive `<=`) → a single segment
///   carrying the document text verbatim.
/// * Otherwise the document is decomposed into units (sections, then
///   paragraphs, then sentences — only as far down as needed) and the units
///   are packed greedily.
pub fn plan(text: &str, budget: usize, estimator: &TokenEstimator) -> ChunkPlan {
    if text.trim().is_empty() {
        return ChunkPlan {
            segments: Vec::new(),
            budget,
        };
    }

    let total = estimator.estimate(text);
    if total <= budget {
        return ChunkPlan {
            segments: vec![Segment {
                index: 0,
                text: text.to_string(),
                estimated_tokens: total,
            }],
            budget,
        };
    }

    let units = decompose(text, budget, estimator);
    let mut segments: Vec<Segment> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    for unit in units {
        let sep = if current.is_empty() { "" } else { unit.sep };
        // Each join costs roughly one token; counting it keeps the running
        // sum an upper bound on the joined text's real estimate.
        let projected = current_tokens + usize::from(!sep.is_empty()) + unit.tokens;

        if !current.is_empty() && projected > budget {
            push_segment(&mut segments, std::mem::take(&mut current), estimator);
            current.push_str(&unit.text);
            current_tokens = unit.tokens;
        } else {
            current.push_str(sep);
            current.push_str(&unit.text);
            current_tokens = projected;
        }
    }
    if !current.is_empty() {
        push_segment(&mut segments, current, estimator);
    }

    ChunkPlan { segments, budget }
}

/// One indivisible packing unit with its canonical separator.
struct Unit {
    text: String,
    tokens: usize,
    /// Separator to place before this unit when it is not segment-initial.
    sep: &'static str,
}

/// Decompose the document into units no finer than necessary: sections that
/// fit stay whole; oversized sections break into paragraphs; oversized
/// paragraphs break into sentences.
fn decompose(text: &str, budget: usize, estimator: &TokenEstimator) -> Vec<Unit> {
    let mut units = Vec::new();

    for section in split_sections(text) {
        let trimmed = section.trim();
        if trimmed.is_empty() {
            continue;
        }
        let tokens = estimator.estimate(trimmed);
        if tokens <= budget {
            units.push(Unit {
                text: trimmed.to_string(),
                tokens,
                sep: "\n\n",
            });
            continue;
        }

        for paragraph in RE_PARA_BREAK.split(section) {
            let para = paragraph.trim();
            if para.is_empty() {
                continue;
            }
            let tokens = estimator.estimate(para);
            if tokens <= budget {
                units.push(Unit {
                    text: para.to_string(),
                    tokens,
                    sep: "\n\n",
                });
                continue;
            }

            let mut first = true;
            for sentence in split_sentences(para) {
                let sentence = sentence.trim();
                if sentence.is_empty() {
                    continue;
                }
                units.push(Unit {
                    text: sentence.to_string(),
                    tokens: estimator.estimate(sentence),
                    // Keep the paragraph break in front of the first
                    // sentence; later sentences rejoin with a space.
                    sep: if first { "\n\n" } else { " " },
                });
                first = false;
            }
        }
    }

    units
}

/// Slice the document at ATX heading line starts. The slices cover the text
/// exactly; the pre-heading preamble (if any) is the first slice.
fn split_sections(text: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = RE_HEADING.find_iter(text).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts.push(text.len());

    starts
        .windows(2)
        .map(|w| &text[w[0]..w[1]])
        .collect()
}

/// Split a paragraph after terminal punctuation (`.` `!` `?`, plus trailing
/// closers) followed by whitespace. Slices cover the paragraph exactly.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if matches!(next, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}') {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if let Some(&(_, next)) = chars.peek() {
            if next.is_whitespace() {
                out.push(&text[start..end]);
                start = end;
            }
        }
    }

    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn push_segment(segments: &mut Vec<Segment>, text: String, estimator: &TokenEstimator) {
    // Re-measure the joined text: the final guarantee is on segment text,
    // not on the unit-sum approximation used while packing.
    let estimated_tokens = estimator.estimate(&text);
    segments.push(Segment {
        index: segments.len(),
        text,
        estimated_tokens,
    });
}
