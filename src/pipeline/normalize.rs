//! Deterministic cleanup of oracle-returned segment text.
//!
//! Even a well-instructed model occasionally disobeys "output only the
//! cleaned Markdown": it wraps the whole answer in a ` ```markdown ` fence,
//! emits Windows line endings, or leaves zero-width characters from the
//! source. These are formatting artefacts the instruction profile already
//! forbids, so fixing them with cheap string rules costs nothing and keeps
//! the profile focused on the hard part.
//!
//! Every rule is a pure `&str → String` function with no shared state;
//! order matters only where noted (fences stripped before blank-line
//! collapsing so the fence lines don't count as content).

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one transformed segment.
///
/// Rules (applied in order):
/// 1. Strip an outer markdown fence wrapping the whole segment
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines down to one
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim leading/trailing blank space so segments join cleanly
pub fn clean_segment(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer markdown fence ───────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fence_with_language() {
        let input = "```markdown\n# Hello\nWorld\n```";
        assert_eq!(strip_outer_fence(input), "# Hello\nWorld");
    }

    #[test]
    fn strips_fence_without_language() {
        let input = "```\n# Hello\nWorld\n```";
        assert_eq!(strip_outer_fence(input), "# Hello\nWorld");
    }

    #[test]
    fn inner_fences_survive() {
        let input = "Intro\n\n```rust\nfn main() {}\n```\n\nOutro";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn crlf_becomes_lf() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn trailing_whitespace_trimmed_per_line() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn blank_line_runs_collapse_to_one() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn invisible_chars_removed() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn full_pipeline_produces_joinable_text() {
        let input = "```markdown\n# Title\r\n\r\nSome text   \n\n\n\n## Section\u{200B}\n```";
        let result = clean_segment(input);
        assert!(result.starts_with("# Title"));
        assert!(result.ends_with("## Section"));
        assert!(!result.contains('\r'));
        assert!(!result.contains("\n\n\n"));
        assert!(!result.contains('\u{200B}'));
    }
}
