//! Instruction profiles sent to the transformation oracle.
//!
//! Centralising every profile here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the contract (e.g. adding a
//!    rule about table formatting) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the profile without a live
//!    oracle, so wording regressions are caught in review.
//!
//! Callers can override the default via
//! [`crate::config::CleanConfig::instruction_profile`]; the constant here is
//! used only when no override is provided.

/// Default instruction profile for Markdown cleanup.
///
/// The contract is strictly formatting normalisation: the oracle may fix
/// structure and remove artefacts, but must not add, drop, or alter any
/// factual content. Used when `CleanConfig::instruction_profile` is `None`.
pub const DEFAULT_INSTRUCTION_PROFILE: &str = r#"You are an expert in Markdown and document structure. Your task is to clean up and restructure Markdown content while following these strict rules:

1. Remove all broken or invalid characters
2. Ensure correct Markdown formatting:
   - Use at most 3 levels of headings (###) and keep the heading hierarchy consistent
   - Use bold (**) and italic (*) for lower-level headings where needed
   - Keep spacing and line breaks uniform
3. Arrange the heading hierarchy so it matches the document's own structure and reads sensibly
4. Do NOT add, remove, or alter any factual information
5. Do NOT hallucinate or invent new content
6. Keep the entire original content; correct only its formatting and structure

Output ONLY the cleaned Markdown content, with no explanations, no commentary, and no surrounding code fences."#;
