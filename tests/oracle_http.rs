//! HTTP-level tests for the OpenAI-compatible oracle client.
//!
//! These run against a local `httpmock` server — no real API traffic — and
//! pin down the status-code classification that the retry loop depends on.

use httpmock::prelude::*;
use mdpolish::pipeline::transform::transform_segment;
use mdpolish::{BackoffPolicy, OpenAiOracle, OracleError, Segment, TransformOracle, TransformStatus};

fn oracle_for(server: &MockServer) -> OpenAiOracle {
    OpenAiOracle::new("test-key", "gpt-4o-mini")
        .unwrap()
        .with_base_url(server.url("/v1"))
        .with_timeout_secs(5)
}

fn segment(text: &str) -> Segment {
    Segment {
        index: 0,
        text: text.to_string(),
        estimated_tokens: text.split_whitespace().count(),
    }
}

#[tokio::test]
async fn happy_path_returns_message_content() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "cleaned text" } }
                    ]
                }));
        })
        .await;

    let oracle = oracle_for(&server);
    let text = oracle.transform("instructions", "raw text").await.unwrap();

    assert_eq!(text, "cleaned text");
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn rate_limit_exhausts_into_retryable_failure() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).body("slow down");
        })
        .await;

    let oracle = oracle_for(&server);
    let policy = BackoffPolicy {
        max_attempts: 2,
        base_delay_ms: 0,
        multiplier: 1.0,
    };
    let result = transform_segment(&oracle, &segment("raw text"), "instructions", &policy, 0.5).await;

    match &result.status {
        TransformStatus::RetryableFailure { attempts, detail } => {
            assert_eq!(*attempts, 2);
            assert!(detail.contains("rate limited"), "got: {detail}");
        }
        other => panic!("expected RetryableFailure, got {other:?}"),
    }
    mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn auth_failure_is_fatal_after_one_call() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(401).body("invalid api key");
        })
        .await;

    let oracle = oracle_for(&server);
    let result = transform_segment(
        &oracle,
        &segment("raw text"),
        "instructions",
        &BackoffPolicy::none(),
        0.5,
    )
    .await;

    assert!(result.status.is_fatal());
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn bad_request_maps_to_malformed_request() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(400).body("unknown model");
        })
        .await;

    let oracle = oracle_for(&server);
    let err = oracle.transform("instructions", "raw text").await.unwrap_err();

    match &err {
        OracleError::MalformedRequest { detail } => {
            assert!(detail.contains("unknown model"), "got: {detail}")
        }
        other => panic!("expected MalformedRequest, got {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn empty_choices_is_a_protocol_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({ "choices": [] }));
        })
        .await;

    let oracle = oracle_for(&server);
    let err = oracle.transform("instructions", "raw text").await.unwrap_err();

    assert!(matches!(err, OracleError::Protocol { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(503).body("overloaded");
        })
        .await;

    let oracle = oracle_for(&server);
    let err = oracle.transform("instructions", "raw text").await.unwrap_err();

    match &err {
        OracleError::Service { status, .. } => assert_eq!(*status, 503),
        other => panic!("expected Service, got {other:?}"),
    }
    assert!(err.is_transient());
}
