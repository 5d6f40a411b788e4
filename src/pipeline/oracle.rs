//! The transformation oracle: capability trait plus the HTTP implementation.
//!
//! The pipeline never talks HTTP directly — it holds an
//! `Arc<dyn TransformOracle>` and calls [`TransformOracle::transform`]. Tests
//! substitute deterministic fakes (echo, fixed-failure, slow) without any
//! network access; production wires in [`OpenAiOracle`] against any
//! OpenAI-compatible chat-completions endpoint.
//!
//! Error classification happens here, at the boundary: every HTTP outcome is
//! mapped onto the [`OracleError`] taxonomy so the retry loop in
//! [`crate::pipeline::transform`] only has to ask `is_transient()`.

use crate::error::{CleanError, OracleError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Capability interface for the external text-transformation service.
///
/// The contract is strictly formatting normalisation: implementations
/// receive the instruction profile and one segment's text, and return the
/// normalised text. Meaning-altering behaviour is a contract violation the
/// pipeline cannot detect beyond its structural checks.
#[async_trait]
pub trait TransformOracle: Send + Sync {
    async fn transform(&self, instructions: &str, text: &str) -> Result<String, OracleError>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
///
/// Works against api.openai.com as well as self-hosted gateways that speak
/// the same protocol; point [`OpenAiOracle::with_base_url`] at the `/v1`
/// root.
pub struct OpenAiOracle {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiOracle {
    /// Create a client for api.openai.com with default settings
    /// (temperature 0.1, 60 s per-call timeout).
    ///
    /// Low temperature keeps the model faithful to the input — exactly what
    /// a formatting-only pass wants.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, CleanError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CleanError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.1,
            timeout: Duration::from_secs(60),
        })
    }

    /// Point the client at a different OpenAI-compatible `/v1` root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl TransformOracle for OpenAiOracle {
    async fn transform(&self, instructions: &str, text: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": instructions },
                { "role": "user", "content": text },
            ],
        });

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    }
                } else {
                    OracleError::Transport {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let detail = snippet(&response.text().await.unwrap_or_default());
            return Err(match status.as_u16() {
                429 => OracleError::RateLimited { retry_after_secs },
                401 | 403 => OracleError::Auth { detail },
                400 | 404 | 422 => OracleError::MalformedRequest { detail },
                code => OracleError::Service {
                    status: code,
                    detail,
                },
            });
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            OracleError::Protocol {
                detail: format!("undecodable response body: {e}"),
            }
        })?;

        debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "oracle call completed"
        );

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Protocol {
                detail: "response contained no message content".to_string(),
            })
    }
}

/// Truncate service error bodies so log lines and reports stay readable.
fn snippet(detail: &str) -> String {
    const MAX: usize = 200;
    let trimmed = detail.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}\u{2026}", &trimmed[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let oracle = OpenAiOracle::new("key", "gpt-4o-mini")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(oracle.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn temperature_is_clamped() {
        let oracle = OpenAiOracle::new("key", "gpt-4o-mini")
            .unwrap()
            .with_temperature(7.0);
        assert_eq!(oracle.temperature, 2.0);
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        let s = snippet(&long);
        assert!(s.chars().count() <= 201);
        assert!(s.ends_with('\u{2026}'));
        assert_eq!(snippet("short"), "short");
    }
}
