//! Cleanup of raw model output before publication.

use regex::Regex;
use std::sync::LazyLock;

/// Markers delimiting the model's internal reasoning segment.
pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("hardcoded regex"));

/// Strip reasoning markup and normalize whitespace.
pub fn clean_response(raw: &str) -> String {
    let stripped = strip_reasoning(raw);
    let collapsed = EXCESS_BLANK_LINES.replace_all(&stripped, "\n\n");
    collapsed.trim().to_string()
}

/// Remove every `<think>…</think>` segment.
///
/// Some model builds emit only the closing marker; in that degenerate case
/// everything before it is reasoning and is dropped.
fn strip_reasoning(text: &str) -> String {
    let mut remaining = text.to_string();

    while let Some(close) = remaining.find(THINK_CLOSE) {
        let after = remaining[close + THINK_CLOSE.len()..].to_string();
        remaining = match remaining[..close].rfind(THINK_OPEN) {
            Some(open) => format!("{}{}", &remaining[..open], after),
            None => after,
        };
    }

    // A stray opening marker with no close would otherwise leak through.
    remaining.replace(THINK_OPEN, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_clean_text_through() {
        assert_eq!(clean_response("A plain answer."), "A plain answer.");
    }

    #[test]
    fn strips_paired_reasoning_segment() {
        let raw = "<think>step 1, step 2</think>The answer is 42.";
        assert_eq!(clean_response(raw), "The answer is 42.");
    }

    #[test]
    fn drops_everything_before_a_lone_close_marker() {
        let raw = "internal chain of thought</think>The answer is 42.";
        assert_eq!(clean_response(raw), "The answer is 42.");
    }

    #[test]
    fn strips_multiple_segments() {
        let raw = "<think>a</think>First.<think>b</think> Second.";
        assert_eq!(clean_response(raw), "First. Second.");
    }

    #[test]
    fn output_never_contains_markers() {
        for raw in [
            "no markers here",
            "<think>x</think>visible",
            "leading</think>visible",
            "<think>unterminated visible",
        ] {
            let cleaned = clean_response(raw);
            assert!(!cleaned.contains(THINK_OPEN), "open marker leaked from {raw:?}");
            assert!(!cleaned.contains(THINK_CLOSE), "close marker leaked from {raw:?}");
        }
    }

    #[test]
    fn collapses_runs_of_blank_lines() {
        let raw = "First paragraph.\n\n\n\n\nSecond paragraph.";
        assert_eq!(clean_response(raw), "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn single_blank_lines_are_preserved() {
        let raw = "First.\n\nSecond.";
        assert_eq!(clean_response(raw), "First.\n\nSecond.");
    }
}
