//! CLI binary for mdpolish.
//!
//! A thin shim over the library crate that maps CLI flags to `CleanConfig`,
//! drives the batch pipeline, and writes cleaned files.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mdpolish::{
    clean_batch, token_report, BackoffPolicy, CleanConfig, CleanProgressCallback, Document,
    DocumentStatus, OpenAiOracle, ProgressCallback, SegmentResult, TransformOracle,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar counting segments across the whole
/// batch. The bar's length grows as documents are planned, which works
/// correctly when several documents are in flight at once.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>4}/{len} segments  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Cleaning");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl CleanProgressCallback for CliProgress {
    fn on_document_start(&self, id: &str, total_segments: usize) {
        self.bar.inc_length(total_segments as u64);
        self.bar
            .println(format!("  {} {} ({} segments)", dim("▸"), id, total_segments));
    }

    fn on_segment_complete(&self, _id: &str, _result: &SegmentResult) {
        self.bar.inc(1);
    }

    fn on_document_complete(&self, id: &str, status: &DocumentStatus) {
        let line = match status {
            DocumentStatus::Completed => format!("  {} {}", green("✓"), id),
            DocumentStatus::PartiallyFailed { missing } => format!(
                "  {} {}  {}",
                yellow("⚠"),
                id,
                yellow(&format!("missing segments {missing:?}"))
            ),
            DocumentStatus::Failed { reason } => {
                format!("  {} {}  {}", red("✗"), id, red(reason))
            }
        };
        self.bar.println(line);
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Clean a single file into ./cleaned/
  mdpolish notes.md

  # Clean every .md file in a directory
  mdpolish markdown_output/ -o cleaned/

  # Count tokens only (no API key needed)
  mdpolish --report markdown_output/

  # Smaller segments, custom model and endpoint
  mdpolish --budget 8000 --model gpt-4.1-mini big_report.md
  mdpolish --base-url http://localhost:11434/v1 --model llama3 notes.md

  # Dump the full batch report as JSON
  mdpolish notes.md --json report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY   API key for the transformation endpoint
  RUST_LOG         Log filter (e.g. mdpolish=debug)
"#;

/// Clean and restructure Markdown documents with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "mdpolish",
    version,
    about = "Clean and restructure Markdown documents with an LLM",
    long_about = "Clean machine-produced Markdown (PDF extractions, OCR output) with an \
OpenAI-compatible LLM. Oversized documents are split into token-bounded segments at natural \
break points, cleaned concurrently, and reassembled in order.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown files or directories containing .md files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for cleaned files.
    #[arg(short, long, default_value = "cleaned")]
    output: PathBuf,

    /// Only print per-document token counts; makes no API calls.
    #[arg(long)]
    report: bool,

    /// Maximum tokens per segment.
    #[arg(long, default_value_t = 80_000)]
    budget: usize,

    /// Tokenization scheme (cl100k_base, o200k_base, p50k_base, r50k_base, words).
    #[arg(long, default_value = "cl100k_base")]
    scheme: String,

    /// Concurrent oracle calls across the batch.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Attempts per segment, including the first.
    #[arg(long, default_value_t = 3)]
    attempts: u32,

    /// Base retry delay in milliseconds (doubles per retry).
    #[arg(long, default_value_t = 500)]
    backoff_ms: u64,

    /// Per-document timeout in seconds.
    #[arg(long, default_value_t = 600)]
    timeout: u64,

    /// Per-call oracle timeout in seconds.
    #[arg(long, default_value_t = 120)]
    call_timeout: u64,

    /// Model identifier.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// OpenAI-compatible API base URL (the /v1 root).
    #[arg(long, default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// API key; read from OPENAI_API_KEY when not given.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Write the full batch report as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mdpolish=warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = collect_inputs(&cli.inputs)?;
    if paths.is_empty() {
        bail!("no .md files found in the given inputs");
    }

    let docs: Vec<Document> = paths
        .iter()
        .map(|p| Document::from_path(p).with_context(|| format!("loading {}", p.display())))
        .collect::<Result<_>>()?;

    // ── Report-only mode ─────────────────────────────────────────────────
    if cli.report {
        let report = token_report(&docs, &cli.scheme)?;
        println!("{report}");
        return Ok(());
    }

    // ── Build oracle + config ────────────────────────────────────────────
    let api_key = cli
        .api_key
        .clone()
        .context("no API key: pass --api-key or set OPENAI_API_KEY")?;
    let oracle: Arc<dyn TransformOracle> = Arc::new(
        OpenAiOracle::new(api_key, &cli.model)?
            .with_base_url(&cli.base_url)
            .with_timeout_secs(cli.call_timeout),
    );

    let progress = CliProgress::new();
    let config = CleanConfig::builder()
        .max_segment_tokens(cli.budget)
        .scheme(&cli.scheme)
        .concurrency(cli.concurrency)
        .backoff(BackoffPolicy {
            max_attempts: cli.attempts,
            base_delay_ms: cli.backoff_ms,
            multiplier: 2.0,
        })
        .document_timeout_secs(cli.timeout)
        .progress_callback(Arc::clone(&progress) as ProgressCallback)
        .build()?;

    eprintln!(
        "{} Cleaning {} document(s) with {} (budget {} tokens)",
        bold("◆"),
        docs.len(),
        cli.model,
        cli.budget
    );

    // ── Run ──────────────────────────────────────────────────────────────
    let batch = clean_batch(&docs, &oracle, &config).await?;
    progress.bar.finish_and_clear();

    // ── Write outputs ────────────────────────────────────────────────────
    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("creating output directory {}", cli.output.display()))?;

    for report in &batch.documents {
        let Some(cleaned) = &report.cleaned else {
            continue;
        };
        let name = Path::new(&report.id)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cleaned.md"));
        let out_path = cli.output.join(name);
        std::fs::write(&out_path, &cleaned.text)
            .with_context(|| format!("writing {}", out_path.display()))?;
        eprintln!("  {} wrote {}", dim("→"), out_path.display());
    }

    if let Some(json_path) = &cli.json {
        let json = serde_json::to_string_pretty(&batch)?;
        std::fs::write(json_path, json)
            .with_context(|| format!("writing {}", json_path.display()))?;
    }

    // ── Summary ──────────────────────────────────────────────────────────
    let completed = batch.completed();
    let partial = batch.partially_failed();
    let failed = batch.failed();
    if partial == 0 && failed == 0 {
        eprintln!(
            "{} {} document(s) cleaned successfully",
            green("✔"),
            bold(&completed.to_string())
        );
    } else {
        eprintln!(
            "{} {}/{} cleaned  ({} partial, {} failed)",
            if completed == 0 { red("✘") } else { yellow("⚠") },
            bold(&completed.to_string()),
            batch.documents.len(),
            partial,
            failed,
        );
        bail!("some documents did not complete");
    }

    Ok(())
}

/// Expand files and directories into a sorted list of .md paths.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input)
                .with_context(|| format!("reading directory {}", input.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("md") {
                    paths.push(path);
                }
            }
        } else {
            paths.push(input.clone());
        }
    }
    paths.sort();
    Ok(paths)
}
