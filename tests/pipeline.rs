//! End-to-end pipeline tests against deterministic fake oracles.
//!
//! No network access: every oracle here is an in-process implementation of
//! the `TransformOracle` capability trait. HTTP-level behaviour of the real
//! client is covered separately in `tests/oracle_http.rs`.

use async_trait::async_trait;
use mdpolish::{
    clean_batch, clean_document, clean_stream, clean_to_file, plan, BackoffPolicy, CleanConfig,
    Document, DocumentStatus, OracleError, StructuralWarning, TokenEstimator, TransformOracle,
    TransformStatus,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ── Fake oracles ─────────────────────────────────────────────────────────────

/// Echoes the input unchanged.
struct EchoOracle;

#[async_trait]
impl TransformOracle for EchoOracle {
    async fn transform(&self, _instructions: &str, text: &str) -> Result<String, OracleError> {
        Ok(text.to_string())
    }
}

/// Fails transiently a fixed number of times, then echoes.
struct FlakyOracle {
    failures_remaining: AtomicU32,
}

#[async_trait]
impl TransformOracle for FlakyOracle {
    async fn transform(&self, _instructions: &str, text: &str) -> Result<String, OracleError> {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(OracleError::Service {
                status: 503,
                detail: "temporarily overloaded".into(),
            })
        } else {
            Ok(text.to_string())
        }
    }
}

/// Echoes, except: `POISON` → auth failure, `BETA` → endless transient failure.
struct MarkedOracle {
    calls: AtomicU32,
}

#[async_trait]
impl TransformOracle for MarkedOracle {
    async fn transform(&self, _instructions: &str, text: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("POISON") {
            return Err(OracleError::Auth {
                detail: "invalid key".into(),
            });
        }
        if text.contains("BETA") {
            return Err(OracleError::Service {
                status: 503,
                detail: "always down".into(),
            });
        }
        Ok(text.to_string())
    }
}

/// Never answers within any realistic deadline.
struct SlowOracle;

#[async_trait]
impl TransformOracle for SlowOracle {
    async fn transform(&self, _instructions: &str, text: &str) -> Result<String, OracleError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(text.to_string())
    }
}

/// Returns the input quadrupled (a hallucination-shaped response).
struct InflatingOracle;

#[async_trait]
impl TransformOracle for InflatingOracle {
    async fn transform(&self, _instructions: &str, text: &str) -> Result<String, OracleError> {
        Ok(text.repeat(4))
    }
}

fn oracle(o: impl TransformOracle + 'static) -> Arc<dyn TransformOracle> {
    Arc::new(o)
}

fn fast_config() -> CleanConfig {
    CleanConfig::builder()
        .scheme("words")
        .backoff(BackoffPolicy::none())
        .build()
        .unwrap()
}

// ── Planner properties through the public API ────────────────────────────────

#[test]
fn under_budget_document_plans_to_one_segment() {
    let estimator = TokenEstimator::for_scheme("words").unwrap();
    let text = "# Title\n\nA handful of words only.";
    let p = plan(text, 1000, &estimator);
    assert_eq!(p.len(), 1);
    assert_eq!(p.segments()[0].text, text);
}

#[test]
fn large_document_plans_to_at_least_four_segments() {
    let doc = large_document();
    let estimator = TokenEstimator::for_scheme("words").unwrap();
    let p = plan(&doc.text, 80_000, &estimator);
    assert!(p.len() >= 4, "expected >= 4 segments, got {}", p.len());
    assert!(p.over_budget_indices().is_empty());
    for seg in p.segments() {
        assert!(seg.estimated_tokens <= 80_000);
    }
}

// ── Orchestrator behaviour ───────────────────────────────────────────────────

/// ~250 000 tokens under the `words` scheme: 250 paragraphs of 1 000 words.
fn large_document() -> Document {
    let paragraph = vec!["token"; 1000].join(" ");
    let text = vec![paragraph; 250].join("\n\n");
    Document::new("large.md", text)
}

#[tokio::test]
async fn identity_oracle_reassembles_large_document_exactly() {
    let doc = large_document();
    let config = CleanConfig::builder()
        .scheme("words")
        .max_segment_tokens(80_000)
        .backoff(BackoffPolicy::none())
        .build()
        .unwrap();

    let report = clean_document(&doc, &oracle(EchoOracle), &config)
        .await
        .unwrap();

    assert_eq!(report.status, DocumentStatus::Completed);
    assert!(report.stats.total_segments >= 4);
    assert_eq!(
        report.stats.transformed_segments,
        report.stats.total_segments
    );
    let cleaned = report.cleaned.expect("completed report carries a document");
    assert_eq!(cleaned.text, doc.text);
}

#[tokio::test]
async fn empty_document_completes_with_empty_output() {
    let doc = Document::new("empty.md", "");
    let report = clean_document(&doc, &oracle(EchoOracle), &fast_config())
        .await
        .unwrap();
    assert_eq!(report.status, DocumentStatus::Completed);
    assert_eq!(report.stats.total_segments, 0);
    assert_eq!(report.cleaned.unwrap().text, "");
}

#[tokio::test]
async fn flaky_oracle_succeeds_on_third_attempt() {
    let doc = Document::new("flaky.md", "just a few words");
    let report = clean_document(
        &doc,
        &oracle(FlakyOracle {
            failures_remaining: AtomicU32::new(2),
        }),
        &fast_config(),
    )
    .await
    .unwrap();

    assert_eq!(report.status, DocumentStatus::Completed);
    assert_eq!(report.segments.len(), 1);
    assert_eq!(report.segments[0].attempts, 3);
}

#[tokio::test]
async fn fatal_document_fails_while_sibling_completes() {
    let docs = vec![
        Document::new("poisoned.md", "POISON in this one"),
        Document::new("healthy.md", "all good over here"),
    ];
    let o = oracle(MarkedOracle {
        calls: AtomicU32::new(0),
    });
    let batch = clean_batch(&docs, &o, &fast_config()).await.unwrap();

    assert_eq!(batch.documents.len(), 2);
    match &batch.documents[0].status {
        DocumentStatus::Failed { reason } => assert!(reason.contains("auth"), "got: {reason}"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(batch.documents[0].cleaned.is_none());

    assert_eq!(batch.documents[1].status, DocumentStatus::Completed);
    assert_eq!(
        batch.documents[1].cleaned.as_ref().unwrap().text,
        "all good over here"
    );
}

#[tokio::test]
async fn exhausted_retries_surface_missing_indices() {
    // Two sentences, one of which the oracle permanently rejects.
    let doc = Document::new("partial.md", "ALPHA one two. BETA three four.");
    let config = CleanConfig::builder()
        .scheme("words")
        .max_segment_tokens(3)
        .backoff(BackoffPolicy {
            max_attempts: 2,
            base_delay_ms: 0,
            multiplier: 1.0,
        })
        .build()
        .unwrap();

    let report = clean_document(
        &doc,
        &oracle(MarkedOracle {
            calls: AtomicU32::new(0),
        }),
        &config,
    )
    .await
    .unwrap();

    assert_eq!(report.stats.total_segments, 2);
    match &report.status {
        DocumentStatus::PartiallyFailed { missing } => assert_eq!(missing, &vec![1]),
        other => panic!("expected PartiallyFailed, got {other:?}"),
    }
    assert!(report.cleaned.is_none(), "no text may be fabricated");
    let failed = &report.segments[1];
    assert!(matches!(
        failed.status,
        TransformStatus::RetryableFailure { attempts: 2, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn document_deadline_preserves_partial_results() {
    let doc = Document::new("slow.md", "First sentence here. Second sentence here.");
    let config = CleanConfig::builder()
        .scheme("words")
        .max_segment_tokens(3)
        .document_timeout_secs(5)
        .backoff(BackoffPolicy::none())
        .build()
        .unwrap();

    let report = clean_document(&doc, &oracle(SlowOracle), &config)
        .await
        .unwrap();

    match &report.status {
        DocumentStatus::PartiallyFailed { missing } => {
            assert_eq!(missing, &vec![0, 1], "all segments should be outstanding")
        }
        other => panic!("expected PartiallyFailed, got {other:?}"),
    }
    assert_eq!(report.stats.skipped_segments, 2);
    assert!(report.cleaned.is_none());
}

#[tokio::test]
async fn unknown_scheme_fails_before_any_oracle_call() {
    let doc = Document::new("doc.md", "some words");
    let o = MarkedOracle {
        calls: AtomicU32::new(0),
    };
    let calls_handle = Arc::new(o);
    let config = CleanConfig::builder().scheme("bogus_scheme").build().unwrap();

    let err = clean_document(
        &doc,
        &(Arc::clone(&calls_handle) as Arc<dyn TransformOracle>),
        &config,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        mdpolish::CleanError::UnsupportedScheme { ref scheme } if scheme == "bogus_scheme"
    ));
    assert_eq!(calls_handle.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn divergent_output_is_kept_but_flagged() {
    let doc = Document::new("inflate.md", "a modest paragraph of ordinary length here");
    let report = clean_document(&doc, &oracle(InflatingOracle), &fast_config())
        .await
        .unwrap();

    assert_eq!(report.status, DocumentStatus::Completed);
    let seg = &report.segments[0];
    assert!(matches!(
        seg.warning,
        Some(StructuralWarning::LengthDivergence { ratio }) if ratio > 2.0
    ));
    // Best-effort text is kept, not discarded.
    assert!(!report.cleaned.unwrap().text.is_empty());
}

// ── Streaming + file output ──────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_every_segment() {
    use futures::StreamExt;

    let doc = Document::new(
        "stream.md",
        "First sentence here. Second sentence here. Third sentence here.",
    );
    let config = CleanConfig::builder()
        .scheme("words")
        .max_segment_tokens(3)
        .backoff(BackoffPolicy::none())
        .build()
        .unwrap();

    let stream = clean_stream(&doc, &oracle(EchoOracle), &config).unwrap();
    let mut results: Vec<_> = stream.collect().await;
    results.sort_by_key(|r| r.index);

    assert_eq!(results.len(), 3);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.index, i);
        assert!(result.status.is_success());
    }
}

#[tokio::test]
async fn clean_to_file_writes_completed_document() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.md");
    let doc = Document::new("file.md", "# Title\n\nSome words to keep.");

    let report = clean_to_file(&doc, &oracle(EchoOracle), &fast_config(), &out_path)
        .await
        .unwrap();

    assert_eq!(report.status, DocumentStatus::Completed);
    let written = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(written, report.cleaned.unwrap().text);
}

#[tokio::test]
async fn clean_to_file_skips_failed_document() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.md");
    let doc = Document::new("poison.md", "POISON here");
    let o = oracle(MarkedOracle {
        calls: AtomicU32::new(0),
    });

    let report = clean_to_file(&doc, &o, &fast_config(), &out_path)
        .await
        .unwrap();

    assert!(matches!(report.status, DocumentStatus::Failed { .. }));
    assert!(!out_path.exists(), "no file may be written for a failed doc");
}
