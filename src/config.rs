//! Configuration types for the cleanup pipeline.
//!
//! All pipeline behaviour is controlled through [`CleanConfig`], built via
//! its [`CleanConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks, and to hand a different budget or
//! retry policy to a test without touching process-global state.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field. The
//! builder lets callers set only what they care about and rely on documented
//! defaults for the rest.

use crate::error::CleanError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Retry schedule for transient oracle failures.
///
/// An explicit policy object rather than loose `max_retries`/`delay` fields
/// so tests can inject [`BackoffPolicy::none`] and run retry paths without
/// sleeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Total attempts per segment, including the first. Minimum 1.
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,

    /// Multiplier applied for each further retry.
    ///
    /// The defaults give 500 ms → 1 s → 2 s, which avoids the
    /// thundering-herd problem where N concurrent workers retry
    /// simultaneously against a recovering endpoint.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// A zero-delay policy for tests: same attempt count, no sleeping.
    pub fn none() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 0,
            multiplier: 1.0,
        }
    }

    /// Delay to sleep before retry number `retry` (1-based).
    ///
    /// `delay_for(1)` is the base delay, `delay_for(2)` is base × multiplier,
    /// and so on. `retry == 0` yields zero (there is no delay before the
    /// first attempt).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let millis = self.base_delay_ms as f64 * self.multiplier.powi(retry as i32 - 1);
        Duration::from_millis(millis as u64)
    }
}

/// Configuration for a document-cleanup run.
///
/// Built via [`CleanConfig::builder()`] or [`CleanConfig::default()`].
///
/// # Example
/// ```rust
/// use mdpolish::CleanConfig;
///
/// let config = CleanConfig::builder()
///     .max_segment_tokens(8_000)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CleanConfig {
    /// Maximum estimated tokens per segment. Default: 80 000.
    ///
    /// The budget bounds what one oracle request may carry. It must leave
    /// headroom in the model's context window for the instruction profile
    /// and the response, which is roughly input-sized for a formatting-only
    /// transformation.
    pub max_segment_tokens: usize,

    /// Tokenization scheme identifier. Default: `"cl100k_base"`.
    ///
    /// Resolved through [`crate::pipeline::tokens::TokenEstimator::for_scheme`];
    /// an unknown identifier fails fast with
    /// [`CleanError::UnsupportedScheme`] before any oracle call is made.
    pub scheme: String,

    /// Retry schedule for transient oracle failures.
    pub backoff: BackoffPolicy,

    /// Concurrent oracle calls, shared across all documents of a batch.
    /// Default: 4.
    ///
    /// Oracle calls are network-bound; a handful in flight cuts wall-clock
    /// time substantially. Lower this if the service rate-limits you.
    pub concurrency: usize,

    /// Length-divergence tolerance for structural validation. Default: 0.5.
    ///
    /// A successful response whose character length falls outside
    /// `[input × tolerance, input ÷ tolerance]` is kept best-effort but
    /// flagged with a [`crate::output::StructuralWarning`] — a formatting
    /// pass should never halve or double a document.
    pub divergence_tolerance: f32,

    /// Overall deadline per document, in seconds. Default: 600.
    ///
    /// On expiry, outstanding segment calls for that document are cancelled;
    /// results already collected are preserved and reported as a partial
    /// failure rather than discarded.
    pub document_timeout_secs: u64,

    /// Custom instruction profile. If `None`, uses
    /// [`crate::prompts::DEFAULT_INSTRUCTION_PROFILE`].
    pub instruction_profile: Option<String>,

    /// Progress callback receiving per-segment and per-document events.
    pub progress: Option<ProgressCallback>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            max_segment_tokens: 80_000,
            scheme: "cl100k_base".to_string(),
            backoff: BackoffPolicy::default(),
            concurrency: 4,
            divergence_tolerance: 0.5,
            document_timeout_secs: 600,
            instruction_profile: None,
            progress: None,
        }
    }
}

impl fmt::Debug for CleanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanConfig")
            .field("max_segment_tokens", &self.max_segment_tokens)
            .field("scheme", &self.scheme)
            .field("backoff", &self.backoff)
            .field("concurrency", &self.concurrency)
            .field("divergence_tolerance", &self.divergence_tolerance)
            .field("document_timeout_secs", &self.document_timeout_secs)
            .field("instruction_profile", &self.instruction_profile)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn CleanProgressCallback>"))
            .finish()
    }
}

impl CleanConfig {
    /// Create a new builder for `CleanConfig`.
    pub fn builder() -> CleanConfigBuilder {
        CleanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CleanConfig`].
#[derive(Debug)]
pub struct CleanConfigBuilder {
    config: CleanConfig,
}

impl CleanConfigBuilder {
    pub fn max_segment_tokens(mut self, n: usize) -> Self {
        self.config.max_segment_tokens = n;
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.config.backoff = policy;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn divergence_tolerance(mut self, ratio: f32) -> Self {
        self.config.divergence_tolerance = ratio;
        self
    }

    pub fn document_timeout_secs(mut self, secs: u64) -> Self {
        self.config.document_timeout_secs = secs;
        self
    }

    pub fn instruction_profile(mut self, profile: impl Into<String>) -> Self {
        self.config.instruction_profile = Some(profile.into());
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CleanConfig, CleanError> {
        let c = &self.config;
        if c.max_segment_tokens == 0 {
            return Err(CleanError::InvalidConfig(
                "max_segment_tokens must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(CleanError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.backoff.max_attempts == 0 {
            return Err(CleanError::InvalidConfig(
                "backoff.max_attempts must be ≥ 1".into(),
            ));
        }
        if !(c.divergence_tolerance > 0.0 && c.divergence_tolerance <= 1.0) {
            return Err(CleanError::InvalidConfig(format!(
                "divergence_tolerance must be in (0, 1], got {}",
                c.divergence_tolerance
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = CleanConfig::builder().build().unwrap();
        assert_eq!(config.max_segment_tokens, 80_000);
        assert_eq!(config.scheme, "cl100k_base");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.backoff, BackoffPolicy::default());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = CleanConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, CleanError::InvalidConfig(_)));
    }

    #[test]
    fn zero_budget_rejected() {
        let err = CleanConfig::builder()
            .max_segment_tokens(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, CleanError::InvalidConfig(_)));
    }

    #[test]
    fn tolerance_out_of_range_rejected() {
        for bad in [0.0, -0.2, 1.5] {
            let err = CleanConfig::builder()
                .divergence_tolerance(bad)
                .build()
                .unwrap_err();
            assert!(matches!(err, CleanError::InvalidConfig(_)), "bad: {bad}");
        }
    }

    #[test]
    fn backoff_schedule_is_exponential() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn zero_delay_policy_never_sleeps() {
        let policy = BackoffPolicy::none();
        for retry in 0..5 {
            assert_eq!(policy.delay_for(retry), Duration::ZERO);
        }
    }
}
