//! Read-only token diagnostics.
//!
//! The reporter answers "how big is this corpus, in oracle tokens?" without
//! touching the pipeline: it shares the [`TokenEstimator`] so its numbers
//! match what the planner will see, but nothing here feeds back into
//! processing.

use crate::error::CleanError;
use crate::output::Document;
use crate::pipeline::tokens::TokenEstimator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token count for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTokenCount {
    pub id: String,
    pub tokens: usize,
}

/// Per-document and aggregate token counts for a corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenReport {
    pub scheme: String,
    pub documents: Vec<DocumentTokenCount>,
    pub total_tokens: usize,
}

/// Count tokens for each document under the given scheme.
///
/// # Errors
/// [`CleanError::UnsupportedScheme`] if the scheme identifier is unknown.
pub fn token_report(docs: &[Document], scheme: &str) -> Result<TokenReport, CleanError> {
    let estimator = TokenEstimator::for_scheme(scheme)?;
    let documents: Vec<DocumentTokenCount> = docs
        .iter()
        .map(|doc| DocumentTokenCount {
            id: doc.id.clone(),
            tokens: estimator.estimate(&doc.text),
        })
        .collect();
    let total_tokens = documents.iter().map(|d| d.tokens).sum();
    Ok(TokenReport {
        scheme: scheme.to_string(),
        documents,
        total_tokens,
    })
}

impl fmt::Display for TokenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for doc in &self.documents {
            writeln!(f, "{:<40} {:>10} tokens", doc.id, doc.tokens)?;
        }
        writeln!(f, "{}", "=".repeat(58))?;
        write!(
            f,
            "Total tokens ({}): {}",
            self.scheme, self.total_tokens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_totals() {
        let docs = vec![
            Document::new("a.md", "one two three"),
            Document::new("b.md", "four five"),
        ];
        let report = token_report(&docs, "words").unwrap();
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.documents[0].tokens, 3);
        assert_eq!(report.documents[1].tokens, 2);
        assert_eq!(report.total_tokens, 5);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let docs = vec![Document::new("a.md", "text")];
        assert!(matches!(
            token_report(&docs, "nope"),
            Err(CleanError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn display_renders_table_and_total() {
        let docs = vec![Document::new("a.md", "one two")];
        let report = token_report(&docs, "words").unwrap();
        let rendered = report.to_string();
        assert!(rendered.contains("a.md"));
        assert!(rendered.contains("Total tokens (words): 2"));
    }
}
