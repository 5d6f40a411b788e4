//! Token estimation: text → integer token count for a fixed scheme.
//!
//! The estimator is the pipeline's only notion of "size". Budgets, plan
//! verification, and the diagnostics report all measure through it, so the
//! same scheme must be used end to end — which is why the scheme lives in
//! [`crate::config::CleanConfig`] and is resolved exactly once per run.
//!
//! The BPE schemes wrap `tiktoken-rs` encoders (the tables the OpenAI-family
//! models actually consume); `words` is a whitespace heuristic for callers
//! whose oracle has no published tokenizer.

use crate::error::CleanError;
use std::fmt;
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, o200k_base, p50k_base, r50k_base, CoreBPE};

/// A supported tokenization scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    /// GPT-4 / GPT-3.5 encoding (default).
    Cl100kBase,
    /// GPT-4o / o-series encoding.
    O200kBase,
    /// Codex-era encoding.
    P50kBase,
    /// GPT-2/GPT-3 encoding.
    R50kBase,
    /// Whitespace-separated word count; cheap, deterministic fallback.
    Words,
}

impl TokenScheme {
    /// Parse a scheme identifier string.
    ///
    /// # Errors
    /// [`CleanError::UnsupportedScheme`] for anything not listed — this is
    /// the fail-fast configuration check the orchestrator runs before any
    /// oracle traffic.
    pub fn parse(name: &str) -> Result<Self, CleanError> {
        match name {
            "cl100k_base" => Ok(TokenScheme::Cl100kBase),
            "o200k_base" => Ok(TokenScheme::O200kBase),
            "p50k_base" => Ok(TokenScheme::P50kBase),
            "r50k_base" => Ok(TokenScheme::R50kBase),
            "words" => Ok(TokenScheme::Words),
            other => Err(CleanError::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScheme::Cl100kBase => "cl100k_base",
            TokenScheme::O200kBase => "o200k_base",
            TokenScheme::P50kBase => "p50k_base",
            TokenScheme::R50kBase => "r50k_base",
            TokenScheme::Words => "words",
        }
    }
}

impl fmt::Display for TokenScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic token counter for one scheme.
///
/// Cheap to clone (the BPE table is behind an `Arc`) and safe to call
/// concurrently; `estimate` is a pure function of its input.
#[derive(Clone)]
pub struct TokenEstimator {
    scheme: TokenScheme,
    bpe: Option<Arc<CoreBPE>>,
}

impl TokenEstimator {
    /// Resolve an estimator from a scheme identifier string.
    pub fn for_scheme(name: &str) -> Result<Self, CleanError> {
        Self::new(TokenScheme::parse(name)?)
    }

    /// Build an estimator for an already-parsed scheme.
    pub fn new(scheme: TokenScheme) -> Result<Self, CleanError> {
        let bpe = match scheme {
            TokenScheme::Cl100kBase => Some(cl100k_base()),
            TokenScheme::O200kBase => Some(o200k_base()),
            TokenScheme::P50kBase => Some(p50k_base()),
            TokenScheme::R50kBase => Some(r50k_base()),
            TokenScheme::Words => None,
        };
        let bpe = match bpe {
            Some(result) => Some(Arc::new(result.map_err(|e| {
                CleanError::Internal(format!("failed to load {scheme} encoder: {e}"))
            })?)),
            None => None,
        };
        Ok(Self { scheme, bpe })
    }

    pub fn scheme(&self) -> TokenScheme {
        self.scheme
    }

    /// Estimated token count for `text`. Non-negative, deterministic.
    pub fn estimate(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            // Whitespace counting, with a floor of 1 for non-empty text so
            // punctuation-only fragments are never free.
            None => {
                let words = text.split_whitespace().count();
                if words == 0 && !text.trim().is_empty() {
                    1
                } else {
                    words
                }
            }
        }
    }
}

impl fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEstimator")
            .field("scheme", &self.scheme)
            .finish()
    }
}
