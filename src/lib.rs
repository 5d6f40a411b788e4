//! # mdpolish
//!
//! Clean and restructure oversized Markdown documents with LLMs.
//!
//! ## Why this crate?
//!
//! Machine-produced Markdown (PDF extractions, OCR output, scraped docs) is
//! full of formatting artefacts — broken characters, inconsistent heading
//! hierarchies, erratic spacing. An LLM fixes these reliably, but long
//! documents do not fit in one request. The hard part is not the model call;
//! it is splitting a document into coherent, token-bounded segments, pushing
//! each through the model concurrently, and reassembling the results in
//! order without losing or duplicating a single sentence. That pipeline is
//! what this crate implements.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Estimate   count tokens under a fixed scheme (tiktoken)
//!  ├─ 2. Plan       split at headings / paragraphs / sentences under budget
//!  ├─ 3. Transform  concurrent oracle calls with retry + backoff
//!  ├─ 4. Normalize  deterministic cleanup of model quirks
//!  └─ 5. Reassemble ordered join + index-completeness check
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdpolish::{clean_document, CleanConfig, Document, OpenAiOracle, TransformOracle};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let oracle: Arc<dyn TransformOracle> = Arc::new(OpenAiOracle::new(
//!         std::env::var("OPENAI_API_KEY")?,
//!         "gpt-4o-mini",
//!     )?);
//!     let config = CleanConfig::default();
//!     let doc = Document::from_path("report.md")?;
//!
//!     let report = clean_document(&doc, &oracle, &config).await?;
//!     match &report.cleaned {
//!         Some(cleaned) => println!("{}", cleaned.text),
//!         None => eprintln!("not completed: {:?}", report.status),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! * Segments never exceed the token budget unless a single indivisible
//!   unit does — and then the segment is flagged, never silently shipped.
//! * Reassembly refuses to produce output with missing segments: you get a
//!   complete document or an explicit list of failed indices, never a
//!   silently truncated one.
//! * One document's failure never cancels its batch siblings.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdpolish` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mdpolish = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod clean;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use clean::{clean_batch, clean_document, clean_sync, clean_to_file};
pub use config::{BackoffPolicy, CleanConfig, CleanConfigBuilder};
pub use error::{CleanError, OracleError};
pub use output::{
    BatchReport, CleanStats, CleanedDocument, Document, DocumentReport, DocumentStatus,
    SegmentResult, StructuralWarning, TransformStatus,
};
pub use pipeline::oracle::{OpenAiOracle, TransformOracle};
pub use pipeline::planner::{plan, ChunkPlan, Segment};
pub use pipeline::reassemble::reassemble;
pub use pipeline::tokens::{TokenEstimator, TokenScheme};
pub use progress::{CleanProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{token_report, DocumentTokenCount, TokenReport};
pub use stream::{clean_stream, SegmentStream};
